//! Tubesum DB - SQLite-backed analysis job storage.

mod database;
mod error;
mod migrations;
mod operations;

pub use database::Database;
pub use error::{DbError, DbResult};
pub use operations::analyses::StatusCounts;
