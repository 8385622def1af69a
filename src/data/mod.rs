//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite connection, migrations and write transactions
//! - Graph, content, timeline and notification stores
//! - Cursor pagination builder

mod content;
mod database;
mod graph;
mod models;
mod notifications;
pub mod query;
mod timeline;

pub use database::{Database, PoolSettings};
pub use models::*;
pub use query::page_size;

#[cfg(test)]
mod database_test;
