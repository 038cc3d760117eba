//! Segment screenshots from cached videos.

use crate::cache::{DownloadProgress, VideoCache};
use crate::error::MediaResult;
use crate::ffmpeg::FrameExtractor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use tubesum_core::{fallback_thumbnail_url, short_id, ScreenshotBatch};
use walkdir::WalkDir;

/// Extracts one still frame per timestamp, falling back to the video
/// thumbnail wherever a frame cannot be produced.
pub struct ScreenshotGenerator {
    cache: Arc<VideoCache>,
    extractor: Arc<dyn FrameExtractor>,
    output_dir: PathBuf,
    url_prefix: String,
}

impl ScreenshotGenerator {
    pub fn new(
        cache: Arc<VideoCache>,
        extractor: Arc<dyn FrameExtractor>,
        output_dir: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            extractor,
            output_dir: output_dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Always returns exactly one URL per timestamp, in order.
    pub async fn generate(
        &self,
        video_id: &str,
        timestamps: &[f64],
        title: &str,
        progress: Option<DownloadProgress>,
    ) -> ScreenshotBatch {
        if timestamps.is_empty() {
            return ScreenshotBatch::default();
        }

        let video = match self.cache.ensure_downloaded(video_id, title, progress).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    "No local copy of {} ({}); using thumbnails for {} screenshots",
                    video_id,
                    e,
                    timestamps.len()
                );
                return ScreenshotBatch::all_fallback(video_id, timestamps.len());
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            warn!("Cannot create {}: {}", self.output_dir.display(), e);
            return ScreenshotBatch::all_fallback(video_id, timestamps.len());
        }

        let mut batch = ScreenshotBatch::default();
        for &timestamp in timestamps {
            let file_name = format!(
                "screenshot_{}_{}s_{}.jpg",
                video_id,
                timestamp.max(0.0) as u64,
                short_id()
            );
            let output = self.output_dir.join(&file_name);

            match self
                .extractor
                .extract_frame(&video.local_path, timestamp, &output)
                .await
            {
                Ok(()) => batch.urls.push(format!("{}/{}", self.url_prefix, file_name)),
                Err(e) => {
                    warn!("Frame at {:.1}s of {} failed: {}", timestamp, video_id, e);
                    batch.urls.push(fallback_thumbnail_url(video_id));
                    batch.fallbacks += 1;
                }
            }
        }

        info!(
            "Generated {} screenshots for {} ({} fallbacks)",
            batch.urls.len() - batch.fallbacks,
            video_id,
            batch.fallbacks
        );
        batch
    }
}

/// Delete screenshot images older than `max_age`. Returns how many were removed.
pub fn cleanup_old_screenshots(dir: &Path, max_age: Duration) -> MediaResult<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if !(name.starts_with("screenshot_") && name.ends_with(".jpg")) {
            continue;
        }

        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        let age = modified.and_then(|m| now.duration_since(m).ok());
        if matches!(age, Some(age) if age > max_age) {
            std::fs::remove_file(entry.path())?;
            debug!("Removed old screenshot {}", name);
            removed += 1;
        }
    }

    if removed > 0 {
        info!("Removed {} old screenshots from {}", removed, dir.display());
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{VideoSource, VideoStream};
    use crate::error::MediaError;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};

    struct StaticSource;

    #[async_trait]
    impl VideoSource for StaticSource {
        async fn open(&self, _video_id: &str) -> MediaResult<VideoStream> {
            Ok(VideoStream {
                content_length: Some(4),
                chunks: stream::iter(vec![Ok(b"mp4!".to_vec())]).boxed(),
            })
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl VideoSource for BrokenSource {
        async fn open(&self, video_id: &str) -> MediaResult<VideoStream> {
            Err(MediaError::NoSuitableFormat(video_id.to_string()))
        }
    }

    /// Writes a placeholder image, failing past `fail_after` seconds.
    struct FakeExtractor {
        fail_after: f64,
    }

    #[async_trait]
    impl FrameExtractor for FakeExtractor {
        async fn extract_frame(&self, _video: &Path, timestamp: f64, output: &Path) -> MediaResult<()> {
            if timestamp > self.fail_after {
                return Err(MediaError::Ffmpeg("seek past end".to_string()));
            }
            std::fs::write(output, b"jpg")?;
            Ok(())
        }
    }

    fn generator(root: &Path, source: Arc<dyn VideoSource>, fail_after: f64) -> ScreenshotGenerator {
        let cache = Arc::new(VideoCache::open(root.join("videos"), source).unwrap());
        ScreenshotGenerator::new(
            cache,
            Arc::new(FakeExtractor { fail_after }),
            root.join("shots"),
            "/screenshots/",
        )
    }

    #[tokio::test]
    async fn test_generate_one_url_per_timestamp() {
        let temp = tempfile::tempdir().unwrap();
        let gen = generator(temp.path(), Arc::new(StaticSource), 100.0);

        let batch = gen
            .generate("dQw4w9WgXcQ", &[0.0, 42.7, 500.0], "Title", None)
            .await;

        assert_eq!(batch.urls.len(), 3);
        assert_eq!(batch.fallbacks, 1);
        assert!(batch.urls[0].starts_with("/screenshots/screenshot_dQw4w9WgXcQ_0s_"));
        assert!(batch.urls[1].starts_with("/screenshots/screenshot_dQw4w9WgXcQ_42s_"));
        assert!(batch.urls[1].ends_with(".jpg"));
        assert_eq!(batch.urls[2], fallback_thumbnail_url("dQw4w9WgXcQ"));

        let written = std::fs::read_dir(temp.path().join("shots")).unwrap().count();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn test_generate_degrades_when_video_unavailable() {
        let temp = tempfile::tempdir().unwrap();
        let gen = generator(temp.path(), Arc::new(BrokenSource), 100.0);

        let batch = gen.generate("dQw4w9WgXcQ", &[1.0, 2.0], "Title", None).await;
        assert_eq!(batch, ScreenshotBatch::all_fallback("dQw4w9WgXcQ", 2));
    }

    #[tokio::test]
    async fn test_generate_empty() {
        let temp = tempfile::tempdir().unwrap();
        let gen = generator(temp.path(), Arc::new(StaticSource), 100.0);
        assert!(gen.generate("dQw4w9WgXcQ", &[], "Title", None).await.urls.is_empty());
    }

    #[test]
    fn test_cleanup_old_screenshots() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("screenshot_a_1s_x.jpg"), b"1").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"2").unwrap();

        assert_eq!(
            cleanup_old_screenshots(temp.path(), Duration::from_secs(3600)).unwrap(),
            0
        );

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(
            cleanup_old_screenshots(temp.path(), Duration::from_millis(1)).unwrap(),
            1
        );
        assert!(temp.path().join("notes.txt").exists());
        assert_eq!(
            cleanup_old_screenshots(&temp.path().join("missing"), Duration::ZERO).unwrap(),
            0
        );
    }
}
