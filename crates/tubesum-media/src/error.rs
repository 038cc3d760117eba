//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching or processing video media.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Tool not found: {tool}. Please install it.")]
    ToolNotFound { tool: String },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ProcessFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    #[error("No captions: {0}")]
    NoCaptions(String),

    #[error("No downloadable audio+video format for {0}")]
    NoSuitableFormat(String),

    #[error("Video {0} is already downloading")]
    AlreadyDownloading(String),

    #[error("Download of {video_id} failed: {message}")]
    Download { video_id: String, message: String },

    #[error("Video {0} is not cached")]
    NotCached(String),

    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<MediaError> for tubesum_core::Error {
    fn from(err: MediaError) -> Self {
        use tubesum_core::Error;
        match err {
            MediaError::NoCaptions(msg) => Error::NoCaptions(msg),
            MediaError::AlreadyDownloading(id) => Error::AlreadyDownloading(id),
            e @ (MediaError::Download { .. } | MediaError::NoSuitableFormat(_)) => {
                Error::Download(e.to_string())
            }
            MediaError::NotCached(id) => Error::NotFound(format!("Video {} is not cached", id)),
            e @ MediaError::Ffmpeg(_) => Error::FrameExtraction(e.to_string()),
            MediaError::Io(e) => Error::Io(e),
            other => Error::Extraction(other.to_string()),
        }
    }
}
