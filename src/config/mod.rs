//! Configuration and settings management.
//!
//! This module provides application settings types and persistence.
//! Settings are stored in the user's config directory as JSON, with
//! environment-variable overrides for secrets.

mod settings;

pub use settings::{AiSettings, GoogleSettings, Settings, StorageSettings, SyncSettings};
