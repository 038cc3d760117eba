//! Storage contract for analysis jobs.

use crate::error::{Error, Result};
use crate::types::{AnalysisJob, JobUpdate};
use std::collections::HashMap;
use std::sync::RwLock;

/// Durable record of analysis jobs.
///
/// Implementations must serialize `update` per job id so that concurrent
/// writers never observe a half-applied change.
pub trait AnalysisStore: Send + Sync {
    /// Insert a new job record.
    fn create(&self, job: AnalysisJob) -> Result<AnalysisJob>;

    /// Get a job by id.
    fn get(&self, id: &str) -> Result<Option<AnalysisJob>>;

    /// Find the job for a video id, if one was ever submitted.
    fn find_by_video_id(&self, video_id: &str) -> Result<Option<AnalysisJob>>;

    /// All jobs, newest first.
    fn list(&self) -> Result<Vec<AnalysisJob>>;

    /// Apply an update to a job and return the new state.
    fn update(&self, id: &str, update: JobUpdate) -> Result<AnalysisJob>;
}

/// In-process job store.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, AnalysisJob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> Error {
    Error::Other("job store lock poisoned".to_string())
}

impl AnalysisStore for MemoryStore {
    fn create(&self, job: AnalysisJob) -> Result<AnalysisJob> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        if jobs.contains_key(&job.id) {
            return Err(Error::Database(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn get(&self, id: &str) -> Result<Option<AnalysisJob>> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;
        Ok(jobs.get(id).cloned())
    }

    fn find_by_video_id(&self, video_id: &str) -> Result<Option<AnalysisJob>> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;
        Ok(jobs
            .values()
            .filter(|j| j.video_id == video_id)
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    fn list(&self) -> Result<Vec<AnalysisJob>> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;
        let mut all: Vec<AnalysisJob> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    fn update(&self, id: &str, update: JobUpdate) -> Result<AnalysisJob> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("Job not found: {}", id)))?;
        job.apply(update)?;
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobStatus, Subtitle, VideoMetadata};

    fn job(video_id: &str) -> AnalysisJob {
        AnalysisJob::new(
            format!("https://youtu.be/{}", video_id),
            video_id,
            VideoMetadata::default(),
        )
    }

    #[test]
    fn test_create_and_lookup() {
        let store = MemoryStore::new();
        let created = store.create(job("aaaaaaaaaaa")).unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.video_id, "aaaaaaaaaaa");

        let by_video = store.find_by_video_id("aaaaaaaaaaa").unwrap().unwrap();
        assert_eq!(by_video.id, created.id);

        assert!(store.find_by_video_id("bbbbbbbbbbb").unwrap().is_none());
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_applies_transition_rules() {
        let store = MemoryStore::new();
        let created = store.create(job("aaaaaaaaaaa")).unwrap();

        let updated = store
            .update(
                &created.id,
                JobUpdate::Subtitles(vec![Subtitle::new(0.0, 2.0, "hello")]),
            )
            .unwrap();
        assert_eq!(updated.subtitles.len(), 1);

        store
            .update(&created.id, JobUpdate::Fail { error: "x".into() })
            .unwrap();
        let err = store
            .update(&created.id, JobUpdate::Subtitles(vec![]))
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidTransitionError");

        let stored = store.get(&created.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.subtitles.len(), 1);
    }

    #[test]
    fn test_update_missing_job() {
        let store = MemoryStore::new();
        let err = store.update("nope", JobUpdate::Reset).unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
    }

    #[test]
    fn test_list_newest_first() {
        let store = MemoryStore::new();
        let first = store.create(job("aaaaaaaaaaa")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.create(job("bbbbbbbbbbb")).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }
}
