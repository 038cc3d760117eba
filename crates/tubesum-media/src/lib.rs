//! Tubesum Media - video metadata, captions, caching and screenshots.
//!
//! This crate provides:
//! - Metadata and caption lookup (via the yt-dlp CLI)
//! - A persistent per-video download cache
//! - Frame extraction (via the FFmpeg CLI)
//!
//! These rely on external tools being installed on the system.

pub mod cache;
pub mod captions;
mod error;
mod ffmpeg;
mod metadata;
pub mod screenshot;
mod ytdlp;

pub use cache::{
    ByteRange, CacheStats, CachedSlice, CleanupReport, DownloadProgress, VideoCache, VideoSource,
    VideoStream, YtDlpVideoSource,
};
pub use captions::{CaptionExtractor, CaptionTrack};
pub use error::{MediaError, MediaResult};
pub use ffmpeg::{FfmpegFrameExtractor, FrameExtractor};
pub use metadata::{metadata_from_info, YtDlpMetadataResolver};
pub use screenshot::{cleanup_old_screenshots, ScreenshotGenerator};
pub use ytdlp::{parse_video_info, VideoInfo, YtDlp};

/// Check if the external tools are available.
pub fn check_dependencies(ytdlp: &str, ffmpeg: &str) -> Vec<(String, bool)> {
    vec![
        (ytdlp.to_string(), which::which(ytdlp).is_ok()),
        (ffmpeg.to_string(), which::which(ffmpeg).is_ok()),
        ("ffprobe".to_string(), which::which("ffprobe").is_ok()),
    ]
}

/// Check if all required tools are installed.
pub fn all_tools_available(ytdlp: &str, ffmpeg: &str) -> bool {
    check_dependencies(ytdlp, ffmpeg)
        .iter()
        .all(|(_, available)| *available)
}
