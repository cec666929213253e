//! Engine configuration loaded from TOML.
//!
//! ```toml
//! [executor]
//! timeout_ms = 5000
//!
//! [logging]
//! level = "info"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::executor::ExecutorOptions;

/// Environment variable naming the config file when none is passed explicitly.
pub const CONFIG_ENV: &str = "ROWPIPE_CONFIG";

/// Log filter used when the config does not name one.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Engine settings.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl EngineConfig {
    /// Loads the config from `explicit`, else from `$ROWPIPE_CONFIG`, else
    /// from [`default_config_path`]. A path that does not exist yields defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        Ok(Self { path, data })
    }

    /// Parses config text directly.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let data = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Ok(Self { path: None, data })
    }

    /// File the config was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Executor deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.data.executor.timeout_ms.map(Duration::from_millis)
    }

    /// Log filter directive.
    pub fn log_level(&self) -> &str {
        self.data
            .logging
            .level
            .as_deref()
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Converts the executor section into [`ExecutorOptions`].
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            timeout: self.timeout(),
        }
    }
}

/// Per-user config location, e.g. `~/.config/rowpipe/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("rowpipe").join("config.toml"))
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    executor: ExecutorSection,
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ExecutorSection {
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct LoggingSection {
    level: Option<String>,
}

/// Errors raised while loading the engine config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}
