use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "PMDRAFT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/pmdraft.toml";
const ENV_PREFIX: &str = "PMDRAFT";
const ENV_SEPARATOR: &str = "__";

/// Path of the TOML file: `PMDRAFT_CONFIG` or the default location
pub fn config_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load with priority, lowest first:
/// 1. Defaults (struct `Default` impls)
/// 2. TOML file, if present
/// 3. `.env` file (via dotenvy)
/// 4. Process environment, `PMDRAFT__<SECTION>__<KEY>`
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();
    load_from_sources(config_path())
}

pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading configuration");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            path = %config_path.display(),
            "No configuration file, using defaults and environment"
        );
    }

    // PMDRAFT__AUTOSAVE__DEBOUNCE_MS -> autosave.debounce_ms
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
