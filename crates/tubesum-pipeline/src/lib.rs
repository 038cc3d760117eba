//! Tubesum Pipeline - video analysis orchestration.
//!
//! This crate provides:
//! - Capability traits for each pipeline stage
//! - The per-job progress bus
//! - The `Pipeline` orchestrator and job submission
//! - Wiring of concrete backends from configuration

mod builder;
pub mod capabilities;
mod error;
mod fallback;
mod orchestrator;
pub mod progress;

pub use builder::{PipelineBuilder, Services};
pub use capabilities::{MetadataResolver, ScreenshotGenerator, SubtitleExtractor, Summarizer};
pub use error::{PipelineError, PipelineResult};
pub use fallback::demo_subtitles;
pub use orchestrator::{Pipeline, Submission, DEFAULT_STALE_AFTER};
pub use progress::{ClientMessage, ProgressBus, ProgressMessage};
