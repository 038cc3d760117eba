//! Tubesum LLM - chat-completions client and transcript summarization.
//!
//! This crate provides an async client for OpenAI-compatible chat APIs and
//! the summarizer that turns a timestamped transcript into topical segments.

mod client;
mod error;
pub mod summarize;
mod types;

pub use client::ChatClient;
pub use error::{LlmError, LlmResult};
pub use summarize::{build_prompt, format_timestamp, parse_summary, Summarizer};
pub use types::*;
