//! Persistence layer.
//!
//! This module provides the storage layer for the service:
//!
//! - SQLite database for user accounts and saved invoice records
//! - Async-safe database operations via tokio::task::spawn_blocking
//! - Per-entity query modules

mod database;
pub mod queries;
mod schema;

pub use database::{Database, DatabaseError, Result};
