//! Layered configuration
//!
//! Settings are loaded from, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML file (`config/pmdraft.toml`, or the path in `PMDRAFT_CONFIG`)
//! 3. `.env` file
//! 4. Environment variables `PMDRAFT__<section>__<key>`
//!
//! Examples:
//! - `PMDRAFT__AUTOSAVE__DEBOUNCE_MS=250`
//! - `PMDRAFT__STORAGE__PROVIDER=memory`
//! - `PMDRAFT__STORAGE__MAX_PHOTO_BYTES=8MB`

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    AutosaveConfig, Config, DraftsConfig, StorageConfig, StorageProvider, TelemetryConfig,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources and validate it
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from a specific file (plus environment overrides)
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
