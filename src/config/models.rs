use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub drafts: DraftsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Blob backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Local,
    Memory,
}

/// Where photo payloads and draft documents live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_blob_root")]
    pub blob_root: PathBuf,
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,
    /// Largest photo payload `put` accepts
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: ByteSize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            blob_root: default_blob_root(),
            metadata_path: default_metadata_path(),
            max_photo_bytes: default_max_photo_bytes(),
        }
    }
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("data/photos")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("data/drafts")
}

fn default_max_photo_bytes() -> ByteSize {
    ByteSize::mib(15)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutosaveConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Write the latest snapshot once more when the autosaver closes
    #[serde(default = "default_flush_on_close")]
    pub flush_on_close: bool,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            flush_on_close: default_flush_on_close(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    400
}

fn default_flush_on_close() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DraftsConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Checklist used when a command is not given one
    pub default_checklist: Option<PathBuf>,
}

impl Default for DraftsConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            default_checklist: None,
        }
    }
}

fn default_key_prefix() -> String {
    "pmDraft".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
