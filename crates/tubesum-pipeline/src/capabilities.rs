//! Swappable backends for each pipeline stage.

use async_trait::async_trait;
use tubesum_core::{ResolvedVideo, Result, ScreenshotBatch, Subtitle, SummarySegment};
use tubesum_media::{CaptionExtractor, DownloadProgress, YtDlpMetadataResolver};

/// Turns a user-supplied URL into a video id and its metadata.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Fails with `InvalidUrl` before any network access for bad input,
    /// otherwise with `Extraction`.
    async fn resolve(&self, url: &str) -> Result<ResolvedVideo>;
}

/// Produces the timed transcript of a video.
#[async_trait]
pub trait SubtitleExtractor: Send + Sync {
    /// Never returns an empty list; that case is `NoCaptions`.
    async fn extract(&self, video_id: &str) -> Result<Vec<Subtitle>>;
}

/// Splits a transcript into summarized segments.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, subtitles: &[Subtitle]) -> Result<Vec<SummarySegment>>;
}

/// Produces one image URL per timestamp.
#[async_trait]
pub trait ScreenshotGenerator: Send + Sync {
    /// Infallible: failures degrade to fallback thumbnails, and the batch
    /// always has exactly `timestamps.len()` URLs.
    async fn generate(
        &self,
        video_id: &str,
        timestamps: &[f64],
        title: &str,
        progress: Option<DownloadProgress>,
    ) -> ScreenshotBatch;
}

#[async_trait]
impl MetadataResolver for YtDlpMetadataResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedVideo> {
        YtDlpMetadataResolver::resolve(self, url).await
    }
}

#[async_trait]
impl SubtitleExtractor for CaptionExtractor {
    async fn extract(&self, video_id: &str) -> Result<Vec<Subtitle>> {
        Ok(CaptionExtractor::extract(self, video_id).await?)
    }
}

#[async_trait]
impl Summarizer for tubesum_llm::Summarizer {
    async fn summarize(&self, title: &str, subtitles: &[Subtitle]) -> Result<Vec<SummarySegment>> {
        Ok(tubesum_llm::Summarizer::summarize(self, title, subtitles).await?)
    }
}

#[async_trait]
impl ScreenshotGenerator for tubesum_media::ScreenshotGenerator {
    async fn generate(
        &self,
        video_id: &str,
        timestamps: &[f64],
        title: &str,
        progress: Option<DownloadProgress>,
    ) -> ScreenshotBatch {
        tubesum_media::ScreenshotGenerator::generate(self, video_id, timestamps, title, progress)
            .await
    }
}
