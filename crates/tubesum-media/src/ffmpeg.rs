//! FFmpeg integration for still-frame extraction.

use crate::error::{MediaError, MediaResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Produces a single still image from a video file.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Write the frame at `timestamp` seconds of `video` to `output`.
    async fn extract_frame(&self, video: &Path, timestamp: f64, output: &Path) -> MediaResult<()>;
}

/// Frame extractor backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    binary: String,
    width: u32,
    height: u32,
    quality: u8,
}

impl FfmpegFrameExtractor {
    pub fn new(binary: impl Into<String>, width: u32, height: u32, quality: u8) -> Self {
        Self {
            binary: binary.into(),
            width,
            height,
            quality,
        }
    }

    /// Arguments for a seek-then-grab of exactly one scaled frame.
    fn args(&self, video: &Path, timestamp: f64, output: &Path) -> Vec<String> {
        vec![
            "-ss".to_string(),
            format!("{:.3}", timestamp.max(0.0)),
            "-i".to_string(),
            video.to_string_lossy().into_owned(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", self.width, self.height),
            "-q:v".to_string(),
            self.quality.to_string(),
            "-f".to_string(),
            "image2".to_string(),
            "-y".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(&self, video: &Path, timestamp: f64, output: &Path) -> MediaResult<()> {
        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }

        if which::which(&self.binary).is_err() {
            return Err(MediaError::ToolNotFound {
                tool: self.binary.clone(),
            });
        }

        let result = Command::new(&self.binary)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .args(self.args(video, timestamp, output))
            .output()
            .await?;

        if !result.status.success() {
            return Err(MediaError::Ffmpeg(
                String::from_utf8_lossy(&result.stderr).trim().to_string(),
            ));
        }

        // Seeking past the end exits cleanly without writing anything.
        if !output.exists() {
            return Err(MediaError::Ffmpeg(format!(
                "no frame at {:.1}s in {}",
                timestamp,
                video.display()
            )));
        }

        debug!("Extracted frame at {:.1}s to {}", timestamp, output.display());
        Ok(())
    }
}
