//! Per-job progress fan-out.
//!
//! Events are delivered to whoever is subscribed at publish time. There is
//! no history: a subscriber only sees events published after it subscribed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use tubesum_core::{JobId, ProgressEvent};

/// Publish/subscribe channel for progress events, keyed by job id.
#[derive(Default)]
pub struct ProgressBus {
    subscribers: Mutex<HashMap<JobId, Vec<UnboundedSender<ProgressEvent>>>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Vec<UnboundedSender<ProgressEvent>>>> {
        // The map holds no invariants a panicking holder could break.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start receiving events for a job. Dropping the receiver unsubscribes.
    pub fn subscribe(&self, job_id: &str) -> UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().entry(job_id.to_string()).or_default().push(tx);
        debug!("New progress subscriber for job {}", job_id);
        rx
    }

    /// Deliver an event to every live subscriber of its job. Returns how many
    /// received it; closed subscribers are dropped silently.
    ///
    /// A terminal event ends the job's subscriptions: once delivered, the
    /// senders are dropped and receivers see the channel close after it.
    pub fn publish(&self, event: ProgressEvent) -> usize {
        let mut subscribers = self.lock();
        let Some(senders) = subscribers.get_mut(&event.job_id) else {
            return 0;
        };

        senders.retain(|tx| tx.send(event.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() || event.is_terminal() {
            subscribers.remove(&event.job_id);
            debug!("Closed progress subscriptions for job {}", event.job_id);
        }
        delivered
    }

    /// Live subscribers for a job.
    pub fn subscriber_count(&self, job_id: &str) -> usize {
        let mut subscribers = self.lock();
        match subscribers.get_mut(job_id) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.len()
            }
            None => 0,
        }
    }
}

/// Server-to-client progress frame: `{"type": "progress", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressMessage {
    Progress { data: ProgressEvent },
}

impl ProgressMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<ProgressEvent> for ProgressMessage {
    fn from(data: ProgressEvent) -> Self {
        ProgressMessage::Progress { data }
    }
}

/// Client-to-server frame: `{"type": "subscribe", "jobId": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe {
        #[serde(rename = "jobId", alias = "analysisId")]
        job_id: JobId,
    },
}

impl ClientMessage {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubesum_core::{PipelineStep, ProgressStatus};

    fn event(job: &str, progress: u8) -> ProgressEvent {
        ProgressEvent::new(job, PipelineStep::Summary, progress, ProgressStatus::Running, "working")
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let bus = ProgressBus::new();
        let mut a = bus.subscribe("job-1");
        let mut b = bus.subscribe("job-1");
        let mut other = bus.subscribe("job-2");

        assert_eq!(bus.publish(event("job-1", 35)), 2);

        assert_eq!(a.recv().await.unwrap().progress, 35);
        assert_eq!(b.recv().await.unwrap().progress, 35);
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let bus = ProgressBus::new();
        assert_eq!(bus.publish(event("job-1", 10)), 0);

        let mut late = bus.subscribe("job-1");
        bus.publish(event("job-1", 30));
        assert_eq!(late.recv().await.unwrap().progress, 30);
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_closed_subscribers_are_dropped() {
        let bus = ProgressBus::new();
        let kept = bus.subscribe("job-1");
        let dropped = bus.subscribe("job-1");
        drop(dropped);

        assert_eq!(bus.subscriber_count("job-1"), 1);
        assert_eq!(bus.publish(event("job-1", 50)), 1);

        drop(kept);
        assert_eq!(bus.publish(event("job-1", 60)), 0);
        assert_eq!(bus.subscriber_count("job-1"), 0);
    }

    #[tokio::test]
    async fn test_terminal_event_releases_job() {
        let bus = ProgressBus::new();
        let mut rx = bus.subscribe("job-1");
        let mut other = bus.subscribe("job-2");

        let done = ProgressEvent::new(
            "job-1",
            PipelineStep::Complete,
            100,
            ProgressStatus::Completed,
            "done",
        );
        assert_eq!(bus.publish(done), 1);
        assert_eq!(bus.subscriber_count("job-1"), 0);

        assert_eq!(rx.recv().await.unwrap().status, ProgressStatus::Completed);
        assert!(rx.recv().await.is_none());

        let failed =
            ProgressEvent::new("job-2", PipelineStep::Summary, 40, ProgressStatus::Error, "boom");
        assert_eq!(bus.publish(failed), 1);
        assert_eq!(bus.subscriber_count("job-2"), 0);
        assert_eq!(other.recv().await.unwrap().status, ProgressStatus::Error);
        assert!(other.recv().await.is_none());

        // A later run of the same job can be followed again.
        let mut again = bus.subscribe("job-1");
        assert_eq!(bus.publish(event("job-1", 10)), 1);
        assert_eq!(again.recv().await.unwrap().progress, 10);
    }

    #[test]
    fn test_wire_format() {
        let msg = ProgressMessage::from(event("job-1", 35));
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["data"]["jobId"], "job-1");
        assert_eq!(json["data"]["step"], "summary");
        assert_eq!(json["data"]["status"], "running");

        let sub = ClientMessage::parse(r#"{"type":"subscribe","jobId":"abc"}"#).unwrap();
        assert_eq!(sub, ClientMessage::Subscribe { job_id: "abc".into() });
        let legacy = ClientMessage::parse(r#"{"type":"subscribe","analysisId":"abc"}"#).unwrap();
        assert_eq!(legacy, sub);
        assert!(ClientMessage::parse(r#"{"type":"unsubscribe"}"#).is_err());
    }
}
