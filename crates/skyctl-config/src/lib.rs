//! Configuration and logging setup for applications embedding skyctl.
//!
//! TOML file plus `SKYCTL_*` environment overrides, translated into the
//! `skyctl_core::ControllerConfig` each `Device` is built with, and a
//! `tracing` subscriber matching the `[logging]` section.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use skyctl_core::{ControllerConfig, PersistentStore, StoreError};

const ENV_PREFIX: &str = "SKYCTL_";
const CONFIG_FILE: &str = "config.toml";
const STORE_FILE: &str = "store.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("cannot open persistent store: {0}")]
    Store(#[from] StoreError),

    #[error("logging already initialized: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Feature controller tuning, handed to every `Device`.
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"skyctl_core=debug"`.
    /// `RUST_LOG` wins when set.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Persistent store file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,

    /// Keep everything in memory; nothing survives the process.
    #[serde(default)]
    pub in_memory: bool,
}

impl Config {
    /// Checks values the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.zoom_repeat_bound == 0 {
            return Err(ConfigError::Validation {
                field: "controller.zoom_repeat_bound".into(),
                reason: "must be at least 1".into(),
            });
        }
        if let Err(err) = EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::Validation {
                field: "logging.level".into(),
                reason: err.to_string(),
            });
        }
        Ok(())
    }

    /// Opens the persistent store this config points at, `None` when
    /// offline settings are disabled.
    pub fn open_store(&self) -> Result<Option<PersistentStore>, ConfigError> {
        if !self.controller.offline_settings {
            return Ok(None);
        }
        if self.store.in_memory {
            return Ok(Some(PersistentStore::in_memory()));
        }
        let path = self.store.path.clone().unwrap_or_else(store_path);
        debug!(path = %path.display(), "opening persistent store");
        Ok(Some(PersistentStore::open(path)?))
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "skyctl", "skyctl")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join(CONFIG_FILE),
        |dirs| dirs.config_dir().join(CONFIG_FILE),
    )
}

/// Default location of the persistent store.
pub fn store_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join(STORE_FILE),
        |dirs| dirs.data_dir().join(STORE_FILE),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("skyctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys nest with a double underscore:
/// `SKYCTL_CONTROLLER__ZOOM_REPEAT_BOUND=4`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Load config, falling back to the defaults on any error.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Logging ─────────────────────────────────────────────────────────

/// Install the global `tracing` subscriber. Fails if one is already set.
pub fn init_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|err| ConfigError::Validation {
            field: "logging.level".into(),
            reason: err.to_string(),
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let result = match logging.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|err| ConfigError::Logging(err.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.controller.offline_settings);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
[controller]
zoom_repeat_bound = 3
assume_main_camera_active = false

[logging]
level = "skyctl_core=debug"
format = "json"

[store]
in_memory = true
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.controller.zoom_repeat_bound, 3);
        assert!(!config.controller.assume_main_camera_active);
        assert!(config.controller.offline_settings, "unset keys keep their default");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.open_store().unwrap().unwrap().path().is_none());
    }

    #[test]
    fn zero_repeat_bound_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[controller]\nzoom_repeat_bound = 0\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "controller.zoom_repeat_bound"));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = Config::default();
        config.store.path = Some(dir.path().join("store.json"));
        config.controller.offline_settings = false;

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.open_store().unwrap().is_none());
    }

    #[test]
    fn store_opens_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = Some(dir.path().join("store.json"));

        let store = config.open_store().unwrap().unwrap();
        assert_eq!(store.path(), Some(dir.path().join("store.json").as_path()));
    }
}
