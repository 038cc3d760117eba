//! Tubesum Core - Core types and domain models for video analysis jobs.

mod error;
mod store;
mod types;
mod youtube;

pub use error::{Error, Result};
pub use store::{AnalysisStore, MemoryStore};
pub use types::*;
pub use youtube::{fallback_thumbnail_url, parse_video_id, watch_url};
