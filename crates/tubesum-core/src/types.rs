//! Core domain types for Tubesum.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for analysis jobs.
pub type JobId = String;

/// Generate a new unique ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a short random suffix for file names.
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// Lifecycle status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether polling clients can stop watching this job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptive metadata of a video, fixed at job creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: String,
    pub channel: String,
    /// Duration in whole seconds.
    pub duration: u64,
    pub publish_date: String,
    pub thumbnail_url: String,
}

/// A validated video id together with its resolved metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVideo {
    pub video_id: String,
    pub metadata: VideoMetadata,
}

/// One timed caption line. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Subtitle {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end: end.max(start),
            text: text.into(),
        }
    }

    /// Interval overlap with `[start, end)`.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start < end && self.end > start
    }
}

/// Subtitles whose interval overlaps `[start, end)`, in their original order.
pub fn overlapping_subtitles(subtitles: &[Subtitle], start: f64, end: f64) -> Vec<Subtitle> {
    subtitles
        .iter()
        .filter(|s| s.overlaps(start, end))
        .cloned()
        .collect()
}

/// A topical slice of the video produced by the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySegment {
    pub id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub title: String,
    pub ai_summary: String,
    #[serde(default)]
    pub screenshot_url: String,
    #[serde(default)]
    pub subtitles: Vec<Subtitle>,
}

impl SummarySegment {
    pub fn new(
        id: impl Into<String>,
        start_time: f64,
        end_time: f64,
        title: impl Into<String>,
        ai_summary: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time,
            title: title.into(),
            ai_summary: ai_summary.into(),
            screenshot_url: String::new(),
            subtitles: Vec::new(),
        }
    }

    /// Attach every subtitle overlapping this segment's time range.
    pub fn with_subtitles_from(mut self, subtitles: &[Subtitle]) -> Self {
        self.subtitles = overlapping_subtitles(subtitles, self.start_time, self.end_time);
        self
    }
}

/// A state change requested on a stored job.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// Replace the transcript wholesale.
    Subtitles(Vec<Subtitle>),
    /// Persist final segments and mark the job completed.
    Complete { segments: Vec<SummarySegment> },
    /// Mark the job failed with a diagnostic message.
    Fail { error: String },
    /// Clear results and return a terminal job to processing.
    Reset,
}

/// One end-to-end request to summarize a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub id: JobId,
    pub source_url: String,
    pub video_id: String,
    pub metadata: VideoMetadata,
    pub subtitles: Vec<Subtitle>,
    pub segments: Vec<SummarySegment>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisJob {
    pub fn new(
        source_url: impl Into<String>,
        video_id: impl Into<String>,
        metadata: VideoMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            source_url: source_url.into(),
            video_id: video_id.into(),
            metadata,
            subtitles: Vec::new(),
            segments: Vec::new(),
            status: JobStatus::Processing,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update, enforcing the allowed status transitions.
    ///
    /// Results may only be written while processing; a terminal job must be
    /// reset before it can run again.
    pub fn apply(&mut self, update: JobUpdate) -> Result<()> {
        match update {
            JobUpdate::Subtitles(subtitles) => {
                self.require_processing("store subtitles")?;
                self.subtitles = subtitles;
            }
            JobUpdate::Complete { segments } => {
                self.require_processing("complete")?;
                if segments.is_empty() {
                    return Err(Error::InvalidTransition(format!(
                        "job {} cannot complete without segments",
                        self.id
                    )));
                }
                self.segments = segments;
                self.status = JobStatus::Completed;
                self.error = None;
            }
            JobUpdate::Fail { error } => {
                self.require_processing("fail")?;
                self.status = JobStatus::Failed;
                self.error = Some(error);
            }
            JobUpdate::Reset => {
                if !self.status.is_terminal() {
                    return Err(Error::InvalidTransition(format!(
                        "job {} is still processing",
                        self.id
                    )));
                }
                self.subtitles.clear();
                self.segments.clear();
                self.status = JobStatus::Processing;
                self.error = None;
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    fn require_processing(&self, action: &str) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(Error::InvalidTransition(format!(
                "cannot {} job {} in status {}",
                action, self.id, self.status
            )));
        }
        Ok(())
    }
}

/// Download state of a cached video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked local copy of a source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedVideoEntry {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    pub local_path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub downloaded_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub download_status: DownloadStatus,
}

impl CachedVideoEntry {
    /// A fresh entry for a download that is about to start.
    pub fn downloading(
        video_id: impl Into<String>,
        title: impl Into<String>,
        local_path: PathBuf,
        file_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            video_id: video_id.into(),
            title: title.into(),
            local_path,
            file_name: file_name.into(),
            file_size: 0,
            downloaded_at: now,
            last_accessed_at: now,
            download_status: DownloadStatus::Downloading,
        }
    }

    /// Completed and still backed by a file on disk.
    pub fn is_available(&self) -> bool {
        self.download_status == DownloadStatus::Completed && self.local_path.exists()
    }
}

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStep {
    Init,
    Subtitles,
    Summary,
    Screenshots,
    Complete,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::Init => "init",
            PipelineStep::Subtitles => "subtitles",
            PipelineStep::Summary => "summary",
            PipelineStep::Screenshots => "screenshots",
            PipelineStep::Complete => "complete",
        }
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status carried by a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// A transient progress notification for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub step: PipelineStep,
    pub progress: u8,
    pub status: ProgressStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<serde_json::Value>,
}

impl ProgressEvent {
    pub fn new(
        job_id: impl Into<String>,
        step: PipelineStep,
        progress: u8,
        status: ProgressStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            step,
            progress: progress.min(100),
            status,
            message: message.into(),
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Whether this event ends the run it belongs to.
    pub fn is_terminal(&self) -> bool {
        self.status == ProgressStatus::Error
            || (self.step == PipelineStep::Complete && self.status == ProgressStatus::Completed)
    }
}

/// Screenshot URLs for a batch of timestamps, index-aligned with the request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScreenshotBatch {
    pub urls: Vec<String>,
    /// How many of `urls` are fallback thumbnails.
    pub fallbacks: usize,
}

impl ScreenshotBatch {
    /// One fallback thumbnail per requested timestamp.
    pub fn all_fallback(video_id: &str, count: usize) -> Self {
        Self {
            urls: vec![crate::youtube::fallback_thumbnail_url(video_id); count],
            fallbacks: count,
        }
    }
}
