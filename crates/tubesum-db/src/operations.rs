//! Database CRUD operations.

pub mod analyses;
