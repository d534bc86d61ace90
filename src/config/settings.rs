//! Application settings and configuration types.
//!
//! Settings are persisted to `~/.config/facture/settings.json` (or XDG
//! equivalent) and loaded at startup. Secrets can be supplied or overridden
//! through environment variables so deployments never need them on disk.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Google OAuth application credentials.
    pub google: GoogleSettings,
    /// Extraction model configuration.
    pub ai: AiSettings,
    /// Scheduled processing configuration.
    pub sync: SyncSettings,
    /// Storage locations.
    pub storage: StorageSettings,
}

/// Google OAuth client credentials for token refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

/// Extraction model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// API key for the model backend.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
        }
    }
}

/// Scheduled processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Whether the recurring fleet run is enabled.
    pub enabled: bool,
    /// Five-field cron expression, evaluated in UTC.
    pub schedule: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: "0 2 * * *".to_string(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file path. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
}

impl Settings {
    /// Loads settings from the config file, then applies environment
    /// overrides. Missing file means defaults.
    pub fn load() -> Self {
        let mut settings: Settings = Self::config_file_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();

        settings.apply_env_overrides();
        settings
    }

    /// Path of the persisted settings file, if a config dir exists.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "panbanda", "facture")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// The database path to open: configured, or the platform default.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.storage.database_path {
            return path.clone();
        }

        directories::ProjectDirs::from("com", "panbanda", "facture")
            .map(|dirs| dirs.data_dir().join("facture.db"))
            .unwrap_or_else(|| PathBuf::from("facture.db"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("GOOGLE_CLIENT_ID") {
            self.google.client_id = value;
        }
        if let Ok(value) = std::env::var("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = value;
        }
        if let Ok(value) = std::env::var("GEMINI_API_KEY") {
            self.ai.api_key = value;
        }
        if let Ok(value) = std::env::var("FACTURE_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(value));
        }
    }
}
