//! Error types for Tubesum.

use thiserror::Error;

/// Core error type shared across pipeline capabilities.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid video URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to resolve video metadata: {0}")]
    Extraction(String),

    #[error("No captions available: {0}")]
    NoCaptions(String),

    #[error("Malformed summary response: {0}")]
    MalformedSummary(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Video is already downloading: {0}")]
    AlreadyDownloading(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Frame extraction failed: {0}")]
    FrameExtraction(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable tag identifying the error class, reported in progress events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "InvalidUrlError",
            Error::Extraction(_) => "ExtractionError",
            Error::NoCaptions(_) => "NoCaptionsError",
            Error::MalformedSummary(_) => "MalformedSummaryError",
            Error::Summarization(_) => "SummarizationError",
            Error::AlreadyDownloading(_) => "AlreadyDownloadingError",
            Error::Download(_) => "DownloadError",
            Error::FrameExtraction(_) => "FrameExtractionError",
            Error::InvalidTransition(_) => "InvalidTransitionError",
            Error::NotFound(_) => "NotFoundError",
            Error::Database(_) => "DatabaseError",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IoError",
            Error::Serialization(_) => "SerializationError",
            Error::Other(_) => "InternalError",
        }
    }
}

/// Result type alias using Tubesum's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::MalformedSummary("missing segments".into()).kind(),
            "MalformedSummaryError"
        );
        assert_eq!(Error::InvalidUrl("x".into()).kind(), "InvalidUrlError");
        assert_eq!(Error::Other("boom".into()).kind(), "InternalError");
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.kind(), "SerializationError");
    }
}
