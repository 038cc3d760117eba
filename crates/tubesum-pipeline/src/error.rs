//! Error types for assembling the pipeline.

use thiserror::Error;

/// Result type for pipeline setup.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while wiring the pipeline from configuration.
///
/// Failures while a job runs are recorded on the job instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] tubesum_db::DbError),

    #[error("Config error: {0}")]
    Config(#[from] tubesum_config::ConfigError),

    #[error("Media error: {0}")]
    Media(#[from] tubesum_media::MediaError),

    #[error("LLM error: {0}")]
    Llm(#[from] tubesum_llm::LlmError),
}
