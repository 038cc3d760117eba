//! The analysis pipeline: submission, stage sequencing and failure handling.

use crate::capabilities::{MetadataResolver, ScreenshotGenerator, SubtitleExtractor, Summarizer};
use crate::fallback::demo_subtitles;
use crate::progress::ProgressBus;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tubesum_core::{
    fallback_thumbnail_url, overlapping_subtitles, parse_video_id, AnalysisJob, AnalysisStore,
    Error, JobStatus, JobUpdate, PipelineStep, ProgressEvent, ProgressStatus, Result,
};
use tubesum_media::DownloadProgress;

/// How long a `processing` job may go without a store update before a new
/// submission treats its run as dead.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Outcome of a submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job: AnalysisJob,
    /// Whether the job needs a pipeline run (new or regenerated).
    pub needs_run: bool,
}

/// Drives analysis jobs through subtitles, summary and screenshots.
///
/// Cheap to clone; clones share the store, bus and backends.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn AnalysisStore>,
    bus: Arc<ProgressBus>,
    resolver: Arc<dyn MetadataResolver>,
    subtitles: Arc<dyn SubtitleExtractor>,
    summarizer: Arc<dyn Summarizer>,
    screenshots: Arc<dyn ScreenshotGenerator>,
    /// Serializes find-or-create so one video never gets two jobs.
    submit_lock: Arc<Mutex<()>>,
    stale_after: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        bus: Arc<ProgressBus>,
        resolver: Arc<dyn MetadataResolver>,
        subtitles: Arc<dyn SubtitleExtractor>,
        summarizer: Arc<dyn Summarizer>,
        screenshots: Arc<dyn ScreenshotGenerator>,
    ) -> Self {
        Self {
            store,
            bus,
            resolver,
            subtitles,
            summarizer,
            screenshots,
            submit_lock: Arc::new(Mutex::new(())),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Override the age at which an unfinished `processing` job counts as
    /// interrupted.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn store(&self) -> &Arc<dyn AnalysisStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<ProgressBus> {
        &self.bus
    }

    /// Get a job by id.
    pub fn get(&self, job_id: &str) -> Result<Option<AnalysisJob>> {
        self.store.get(job_id)
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Result<Vec<AnalysisJob>> {
        self.store.list()
    }

    /// Find or create the job for a URL without starting it.
    ///
    /// An existing job for the same video is returned as-is unless `force`
    /// is set, in which case a finished job is reset and reused under the
    /// same id. A job that is still processing is never reset, unless it
    /// has gone longer than the stale threshold without an update: such a
    /// job was left behind by a run that died, so it is marked failed first.
    pub async fn submit(&self, url: &str, force: bool) -> Result<Submission> {
        let video_id = parse_video_id(url)?;
        let _guard = self.submit_lock.lock().await;

        if let Some(mut existing) = self.store.find_by_video_id(&video_id)? {
            if self.is_stale(&existing) {
                warn!(
                    "Job {} for {} has not progressed since {}; marking it failed",
                    existing.id, video_id, existing.updated_at
                );
                existing = self.store.update(
                    &existing.id,
                    JobUpdate::Fail {
                        error: format!(
                            "Run interrupted: no progress since {}",
                            existing.updated_at.to_rfc3339()
                        ),
                    },
                )?;
            }
            if !force {
                debug!("Reusing job {} for video {}", existing.id, video_id);
                return Ok(Submission {
                    job: existing,
                    needs_run: false,
                });
            }
            if existing.status == JobStatus::Processing {
                warn!(
                    "Job {} for {} is still processing; ignoring regenerate request",
                    existing.id, video_id
                );
                return Ok(Submission {
                    job: existing,
                    needs_run: false,
                });
            }

            info!("Regenerating job {} for video {}", existing.id, video_id);
            let job = self.store.update(&existing.id, JobUpdate::Reset)?;
            return Ok(Submission {
                job,
                needs_run: true,
            });
        }

        let resolved = self.resolver.resolve(url).await?;
        let job = self.store.create(AnalysisJob::new(
            url,
            resolved.video_id,
            resolved.metadata,
        ))?;
        info!("Created job {} for \"{}\"", job.id, job.metadata.title);

        Ok(Submission {
            job,
            needs_run: true,
        })
    }

    fn is_stale(&self, job: &AnalysisJob) -> bool {
        if job.status != JobStatus::Processing {
            return false;
        }
        // A clock step backwards yields a negative age, which is never stale.
        Utc::now()
            .signed_duration_since(job.updated_at)
            .to_std()
            .map(|age| age >= self.stale_after)
            .unwrap_or(false)
    }

    /// Submit and, when needed, start processing in the background.
    /// Returns the job record as it was before processing began.
    pub async fn analyze(&self, url: &str, force: bool) -> Result<AnalysisJob> {
        let submission = self.submit(url, force).await?;
        if submission.needs_run {
            self.spawn(&submission.job.id);
        }
        Ok(submission.job)
    }

    /// Run `process` on the tokio runtime.
    pub fn spawn(&self, job_id: &str) -> JoinHandle<()> {
        let pipeline = self.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move { pipeline.process(&job_id).await })
    }

    /// Run every stage for a job. Never returns an error: any failure is
    /// recorded on the job and published as an `error` event.
    pub async fn process(&self, job_id: &str) {
        let mut run = Run::new(&self.bus, job_id);
        match self.run_stages(&mut run).await {
            Ok(()) => {}
            Err(err) => self.fail(&run, err),
        }
    }

    async fn run_stages(&self, run: &mut Run<'_>) -> Result<()> {
        // Init
        run.running(PipelineStep::Init, 0, "Starting analysis");
        let job = self
            .store
            .get(&run.job_id)?
            .ok_or_else(|| Error::NotFound(format!("Job not found: {}", run.job_id)))?;
        if job.status != JobStatus::Processing {
            return Err(Error::InvalidTransition(format!(
                "job {} is {}, not processing",
                job.id, job.status
            )));
        }
        info!("Processing job {} ({})", job.id, job.video_id);

        // Subtitles: unavailable captions never fail the job.
        run.running(PipelineStep::Subtitles, 10, "Extracting subtitles");
        let (subtitles, is_demo) = match self.subtitles.extract(&job.video_id).await {
            Ok(subs) if !subs.is_empty() => (subs, false),
            Ok(_) => {
                warn!("Empty transcript for {}; using demo subtitles", job.video_id);
                (demo_subtitles(), true)
            }
            Err(e) => {
                warn!("No subtitles for {} ({}); using demo subtitles", job.video_id, e);
                (demo_subtitles(), true)
            }
        };
        self.store
            .update(&job.id, JobUpdate::Subtitles(subtitles.clone()))?;
        run.completed(
            PipelineStep::Subtitles,
            30,
            format!("Extracted {} subtitle lines", subtitles.len()),
            json!({ "subtitleCount": subtitles.len(), "isDemoData": is_demo }),
        );

        // Summary
        run.running(PipelineStep::Summary, 35, "Generating AI summary");
        let mut segments = self
            .summarizer
            .summarize(&job.metadata.title, &subtitles)
            .await?;
        if segments.is_empty() {
            return Err(Error::MalformedSummary("summarizer returned no segments".into()));
        }
        run.completed(
            PipelineStep::Summary,
            60,
            format!("Generated {} segments", segments.len()),
            json!({ "segmentCount": segments.len() }),
        );

        // Screenshots: degrade to thumbnails, never fail.
        run.running(PipelineStep::Screenshots, 65, "Generating screenshots");
        let timestamps: Vec<f64> = segments.iter().map(|s| s.start_time).collect();
        let batch = self
            .screenshots
            .generate(
                &job.video_id,
                &timestamps,
                &job.metadata.title,
                Some(download_progress(self.bus.clone(), &job.id)),
            )
            .await;
        if batch.urls.len() != timestamps.len() {
            warn!(
                "Expected {} screenshots for {}, got {}",
                timestamps.len(),
                job.video_id,
                batch.urls.len()
            );
        }

        let mut fallbacks = batch.fallbacks;
        for (i, segment) in segments.iter_mut().enumerate() {
            segment.screenshot_url = match batch.urls.get(i) {
                Some(url) if !url.is_empty() => url.clone(),
                _ => {
                    fallbacks += 1;
                    fallback_thumbnail_url(&job.video_id)
                }
            };
            segment.subtitles =
                overlapping_subtitles(&subtitles, segment.start_time, segment.end_time);
        }
        let fallbacks = fallbacks.min(segments.len());
        run.completed(
            PipelineStep::Screenshots,
            90,
            format!("Generated {} screenshots", segments.len() - fallbacks),
            json!({ "screenshotCount": segments.len(), "fallbackCount": fallbacks }),
        );

        // Finalize
        let segment_count = segments.len();
        self.store
            .update(&job.id, JobUpdate::Complete { segments })?;
        run.completed(
            PipelineStep::Complete,
            100,
            "Analysis complete",
            json!({
                "totalSegments": segment_count,
                "totalSubtitles": subtitles.len(),
                "totalScreenshots": segment_count - fallbacks,
            }),
        );
        info!("Job {} completed with {} segments", job.id, segment_count);

        Ok(())
    }

    /// Record a failure: persist `failed` first, then tell subscribers.
    fn fail(&self, run: &Run<'_>, err: Error) {
        error!(
            "Job {} failed during {}: {} ({})",
            run.job_id,
            run.step,
            err,
            err.kind()
        );

        let message = err.to_string();
        if let Err(e) = self.store.update(
            &run.job_id,
            JobUpdate::Fail {
                error: message.clone(),
            },
        ) {
            warn!("Could not mark job {} failed: {}", run.job_id, e);
        }

        run.publish(
            ProgressEvent::new(
                run.job_id.clone(),
                run.step,
                run.progress,
                ProgressStatus::Error,
                message.clone(),
            )
            .with_details(json!({ "errorKind": err.kind(), "error": message })),
        );
    }
}

/// Progress bookkeeping for one run, so failures report where they happened.
struct Run<'a> {
    bus: &'a ProgressBus,
    job_id: String,
    step: PipelineStep,
    progress: u8,
}

impl<'a> Run<'a> {
    fn new(bus: &'a ProgressBus, job_id: &str) -> Self {
        Self {
            bus,
            job_id: job_id.to_string(),
            step: PipelineStep::Init,
            progress: 0,
        }
    }

    fn publish(&self, event: ProgressEvent) {
        self.bus.publish(event);
    }

    fn running(&mut self, step: PipelineStep, progress: u8, message: &str) {
        self.step = step;
        self.progress = progress;
        self.publish(ProgressEvent::new(
            self.job_id.clone(),
            step,
            progress,
            ProgressStatus::Running,
            message,
        ));
    }

    fn completed(
        &mut self,
        step: PipelineStep,
        progress: u8,
        message: impl Into<String>,
        details: Value,
    ) {
        self.step = step;
        self.progress = progress;
        self.publish(
            ProgressEvent::new(
                self.job_id.clone(),
                step,
                progress,
                ProgressStatus::Completed,
                message,
            )
            .with_details(details),
        );
    }
}

/// Forward video download progress as `screenshots` events in 65..=80.
fn download_progress(bus: Arc<ProgressBus>, job_id: &str) -> DownloadProgress {
    let job_id = job_id.to_string();
    Arc::new(move |downloaded: u64, total: Option<u64>| {
        let (progress, message) = match total {
            Some(total) if total > 0 => {
                let fraction = (downloaded as f64 / total as f64).min(1.0);
                (
                    65 + (fraction * 15.0).round() as u8,
                    format!("Downloading video: {:.0}%", fraction * 100.0),
                )
            }
            _ => (
                65,
                format!("Downloading video: {:.1} MB", downloaded as f64 / 1024.0 / 1024.0),
            ),
        };
        bus.publish(
            ProgressEvent::new(
                job_id.clone(),
                PipelineStep::Screenshots,
                progress,
                ProgressStatus::Running,
                message,
            )
            .with_details(json!({ "downloadedBytes": downloaded, "totalBytes": total })),
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tubesum_core::{
        MemoryStore, ResolvedVideo, ScreenshotBatch, Subtitle, SummarySegment, VideoMetadata,
    };

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
    const VIDEO: &str = "dQw4w9WgXcQ";

    #[derive(Default)]
    struct FakeResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataResolver for FakeResolver {
        async fn resolve(&self, url: &str) -> Result<ResolvedVideo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ResolvedVideo {
                video_id: parse_video_id(url)?,
                metadata: VideoMetadata {
                    title: "Test Video".to_string(),
                    channel: "Channel".to_string(),
                    duration: 120,
                    ..Default::default()
                },
            })
        }
    }

    struct FakeSubtitles {
        available: bool,
    }

    #[async_trait]
    impl SubtitleExtractor for FakeSubtitles {
        async fn extract(&self, video_id: &str) -> Result<Vec<Subtitle>> {
            if !self.available {
                return Err(Error::NoCaptions(format!("no tracks for {}", video_id)));
            }
            Ok(vec![
                Subtitle::new(0.0, 12.0, "hello"),
                Subtitle::new(12.0, 25.0, "straddling line"),
                Subtitle::new(25.0, 40.0, "the end"),
            ])
        }
    }

    /// Feeds a canned model reply through the real response validation.
    struct FakeSummarizer {
        reply: &'static str,
    }

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize(
            &self,
            _title: &str,
            subtitles: &[Subtitle],
        ) -> Result<Vec<SummarySegment>> {
            Ok(tubesum_llm::parse_summary(self.reply, subtitles)?)
        }
    }

    const THREE_SEGMENTS: &str = r#"{"segments": [
        {"id": "a", "startTime": 0, "endTime": 20, "title": "One", "aiSummary": "First"},
        {"id": "b", "startTime": 20, "endTime": 30, "title": "Two", "aiSummary": "Second"},
        {"id": "c", "startTime": 30, "endTime": 120, "title": "Three", "aiSummary": "Third"}
    ]}"#;

    enum Shots {
        Frames,
        AllFail,
        Short,
    }

    struct FakeScreenshots {
        mode: Shots,
    }

    #[async_trait]
    impl ScreenshotGenerator for FakeScreenshots {
        async fn generate(
            &self,
            video_id: &str,
            timestamps: &[f64],
            _title: &str,
            progress: Option<DownloadProgress>,
        ) -> ScreenshotBatch {
            if let Some(report) = progress {
                report(50, Some(100));
                report(100, Some(100));
            }
            match self.mode {
                Shots::Frames => ScreenshotBatch {
                    urls: timestamps
                        .iter()
                        .map(|t| format!("/screenshots/{}_{}.jpg", video_id, *t as u64))
                        .collect(),
                    fallbacks: 0,
                },
                Shots::AllFail => ScreenshotBatch::all_fallback(video_id, timestamps.len()),
                Shots::Short => ScreenshotBatch {
                    urls: vec!["/screenshots/first.jpg".to_string()],
                    fallbacks: 0,
                },
            }
        }
    }

    struct Harness {
        pipeline: Pipeline,
        resolver: Arc<FakeResolver>,
    }

    fn harness(captions: bool, reply: &'static str, shots: Shots) -> Harness {
        harness_with_store(Arc::new(MemoryStore::new()), captions, reply, shots)
    }

    fn harness_with_store(
        store: Arc<dyn AnalysisStore>,
        captions: bool,
        reply: &'static str,
        shots: Shots,
    ) -> Harness {
        let resolver = Arc::new(FakeResolver::default());
        let pipeline = Pipeline::new(
            store,
            Arc::new(ProgressBus::new()),
            resolver.clone(),
            Arc::new(FakeSubtitles { available: captions }),
            Arc::new(FakeSummarizer { reply }),
            Arc::new(FakeScreenshots { mode: shots }),
        );
        Harness { pipeline, resolver }
    }

    fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn run_to_end(pipeline: &Pipeline) -> (AnalysisJob, Vec<ProgressEvent>) {
        let submission = pipeline.submit(URL, false).await.unwrap();
        let mut rx = pipeline.bus().subscribe(&submission.job.id);
        pipeline.process(&submission.job.id).await;
        let job = pipeline.get(&submission.job.id).unwrap().unwrap();
        (job, drain(&mut rx))
    }

    #[tokio::test]
    async fn test_happy_path() {
        let h = harness(true, THREE_SEGMENTS, Shots::Frames);
        let (job, events) = run_to_end(&h.pipeline).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.subtitles.len(), 3);
        assert_eq!(job.segments.len(), 3);
        assert_eq!(job.segments[1].screenshot_url, "/screenshots/dQw4w9WgXcQ_20.jpg");

        // Overlap, not containment: the 12-25s line belongs to both neighbours.
        for segment in &job.segments {
            let expected =
                overlapping_subtitles(&job.subtitles, segment.start_time, segment.end_time);
            assert_eq!(segment.subtitles, expected);
        }
        assert_eq!(job.segments[0].subtitles.len(), 2);
        assert_eq!(job.segments[1].subtitles.len(), 2);

        let schedule: Vec<(PipelineStep, ProgressStatus, u8)> = events
            .iter()
            .map(|e| (e.step, e.status, e.progress))
            .collect();
        assert_eq!(
            schedule,
            vec![
                (PipelineStep::Init, ProgressStatus::Running, 0),
                (PipelineStep::Subtitles, ProgressStatus::Running, 10),
                (PipelineStep::Subtitles, ProgressStatus::Completed, 30),
                (PipelineStep::Summary, ProgressStatus::Running, 35),
                (PipelineStep::Summary, ProgressStatus::Completed, 60),
                (PipelineStep::Screenshots, ProgressStatus::Running, 65),
                (PipelineStep::Screenshots, ProgressStatus::Running, 73),
                (PipelineStep::Screenshots, ProgressStatus::Running, 80),
                (PipelineStep::Screenshots, ProgressStatus::Completed, 90),
                (PipelineStep::Complete, ProgressStatus::Completed, 100),
            ]
        );

        let last = events.last().unwrap();
        assert!(last.is_terminal());
        let details = last.details.as_ref().unwrap();
        assert_eq!(details["totalSegments"], 3);
        assert_eq!(details["totalSubtitles"], 3);
        assert_eq!(details["totalScreenshots"], 3);
        assert_eq!(events[2].details.as_ref().unwrap()["isDemoData"], false);
    }

    #[tokio::test]
    async fn test_missing_captions_use_demo_subtitles() {
        let h = harness(false, THREE_SEGMENTS, Shots::Frames);
        let (job, events) = run_to_end(&h.pipeline).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.subtitles, demo_subtitles());

        let subtitles_done = events
            .iter()
            .find(|e| e.step == PipelineStep::Subtitles && e.status == ProgressStatus::Completed)
            .unwrap();
        let details = subtitles_done.details.as_ref().unwrap();
        assert_eq!(details["isDemoData"], true);
        assert_eq!(details["subtitleCount"], 5);
    }

    #[tokio::test]
    async fn test_malformed_summary_fails_job() {
        let h = harness(true, r#"{"sections": []}"#, Shots::Frames);
        let (job, events) = run_to_end(&h.pipeline).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.segments.is_empty());
        assert!(job.error.as_deref().unwrap().contains("segments"));

        let last = events.last().unwrap();
        assert_eq!(last.status, ProgressStatus::Error);
        assert_eq!(last.step, PipelineStep::Summary);
        assert_eq!(last.progress, 35);
        assert_eq!(
            last.details.as_ref().unwrap()["errorKind"],
            "MalformedSummaryError"
        );
        assert!(!events.iter().any(|e| e.step == PipelineStep::Screenshots));
    }

    #[tokio::test]
    async fn test_screenshot_failures_do_not_fail_job() {
        let h = harness(true, THREE_SEGMENTS, Shots::AllFail);
        let (job, events) = run_to_end(&h.pipeline).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.segments.len(), 3);
        let thumbnail = fallback_thumbnail_url(VIDEO);
        assert!(job.segments.iter().all(|s| s.screenshot_url == thumbnail));

        let shots_done = events
            .iter()
            .find(|e| e.step == PipelineStep::Screenshots && e.status == ProgressStatus::Completed)
            .unwrap();
        assert_eq!(shots_done.details.as_ref().unwrap()["fallbackCount"], 3);
    }

    #[tokio::test]
    async fn test_short_screenshot_batch_is_padded() {
        let h = harness(true, THREE_SEGMENTS, Shots::Short);
        let (job, _) = run_to_end(&h.pipeline).await;

        assert_eq!(job.segments[0].screenshot_url, "/screenshots/first.jpg");
        assert_eq!(job.segments[1].screenshot_url, fallback_thumbnail_url(VIDEO));
        assert_eq!(job.segments[2].screenshot_url, fallback_thumbnail_url(VIDEO));
    }

    #[tokio::test]
    async fn test_duplicate_submission_reuses_job() {
        let h = harness(true, THREE_SEGMENTS, Shots::Frames);

        let first = h.pipeline.submit(URL, false).await.unwrap();
        let second = h
            .pipeline
            .submit("https://youtu.be/dQw4w9WgXcQ", false)
            .await
            .unwrap();

        assert!(first.needs_run);
        assert!(!second.needs_run);
        assert_eq!(first.job.id, second.job.id);
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.pipeline.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_force_regenerate_resets_same_job() {
        let h = harness(true, THREE_SEGMENTS, Shots::Frames);
        let (done, _) = run_to_end(&h.pipeline).await;
        assert_eq!(done.status, JobStatus::Completed);

        let again = h.pipeline.submit(URL, true).await.unwrap();
        assert!(again.needs_run);
        assert_eq!(again.job.id, done.id);
        assert_eq!(again.job.status, JobStatus::Processing);
        assert!(again.job.subtitles.is_empty());
        assert!(again.job.segments.is_empty());
        assert_eq!(again.job.created_at, done.created_at);

        h.pipeline.process(&again.job.id).await;
        let rerun = h.pipeline.get(&done.id).unwrap().unwrap();
        assert_eq!(rerun.status, JobStatus::Completed);
        assert_eq!(h.pipeline.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_force_on_processing_job_is_ignored() {
        let h = harness(true, THREE_SEGMENTS, Shots::Frames);
        let first = h.pipeline.submit(URL, false).await.unwrap();
        let forced = h.pipeline.submit(URL, true).await.unwrap();

        assert!(!forced.needs_run);
        assert_eq!(forced.job.id, first.job.id);
        assert_eq!(forced.job.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_interrupted_run_is_failed_on_next_submit() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tubesum.db");

        // A run that created its job and then died before processing it.
        let orphan = {
            let db = tubesum_db::Database::open(&path).unwrap();
            let h = harness_with_store(Arc::new(db), true, THREE_SEGMENTS, Shots::Frames);
            let submission = h.pipeline.submit(URL, false).await.unwrap();
            assert!(submission.needs_run);
            submission.job
        };

        let db = tubesum_db::Database::open(&path).unwrap();
        let h = harness_with_store(Arc::new(db), true, THREE_SEGMENTS, Shots::Frames);
        let pipeline = h.pipeline.with_stale_after(Duration::ZERO);

        let plain = pipeline.submit(URL, false).await.unwrap();
        assert!(!plain.needs_run);
        assert_eq!(plain.job.id, orphan.id);
        assert_eq!(plain.job.status, JobStatus::Failed);
        assert!(plain
            .job
            .error
            .as_deref()
            .unwrap()
            .starts_with("Run interrupted"));

        let forced = pipeline.submit(URL, true).await.unwrap();
        assert!(forced.needs_run);
        assert_eq!(forced.job.id, orphan.id);
        assert_eq!(forced.job.status, JobStatus::Processing);
        assert!(forced.job.error.is_none());

        pipeline.process(&forced.job.id).await;
        let done = pipeline.get(&orphan.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(pipeline.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recent_processing_job_is_not_stale() {
        let h = harness(true, THREE_SEGMENTS, Shots::Frames);
        let pipeline = h.pipeline.with_stale_after(Duration::from_secs(3600));
        let first = pipeline.submit(URL, false).await.unwrap();

        let plain = pipeline.submit(URL, false).await.unwrap();
        assert_eq!(plain.job.id, first.job.id);
        assert_eq!(plain.job.status, JobStatus::Processing);
        assert!(plain.job.error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_creates_nothing() {
        let h = harness(true, THREE_SEGMENTS, Shots::Frames);
        let err = h
            .pipeline
            .submit("https://vimeo.com/12345", false)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "InvalidUrlError");
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);
        assert!(h.pipeline.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job_emits_error() {
        let h = harness(true, THREE_SEGMENTS, Shots::Frames);
        let mut rx = h.pipeline.bus().subscribe("missing");
        h.pipeline.process("missing").await;

        let events = drain(&mut rx);
        let last = events.last().unwrap();
        assert_eq!(last.status, ProgressStatus::Error);
        assert_eq!(last.step, PipelineStep::Init);
        assert_eq!(last.details.as_ref().unwrap()["errorKind"], "NotFoundError");
    }

    #[tokio::test]
    async fn test_analyze_runs_in_background() {
        let h = harness(true, THREE_SEGMENTS, Shots::Frames);
        let job = h.pipeline.analyze(URL, false).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        let mut status = job.status;
        for _ in 0..100 {
            status = h.pipeline.get(&job.id).unwrap().unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status, JobStatus::Completed);
    }
}
