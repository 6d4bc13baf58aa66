//! Console configuration file.
//!
//! Loaded from `--config <path>` or `<config_dir>/kernel-console/config.toml`.
//! A missing default file means defaults; a missing explicit file is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use kernel_console_session::EngineConfig;
use serde::Deserialize;

const APP_DIR: &str = "kernel-console";

/// Errors from loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Engine timings in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_timeout_ms: u64,
    pub tick_ms: u64,
    pub completeness_timeout_ms: u64,
    pub kernel_info_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::from(EngineConfig::default())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl From<EngineConfig> for TimingConfig {
    fn from(config: EngineConfig) -> Self {
        Self {
            poll_timeout_ms: millis(config.poll_timeout),
            tick_ms: millis(config.tick),
            completeness_timeout_ms: millis(config.completeness_timeout),
            kernel_info_timeout_ms: millis(config.kernel_info_timeout),
            shutdown_grace_ms: millis(config.shutdown_grace),
        }
    }
}

impl From<&TimingConfig> for EngineConfig {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            poll_timeout: Duration::from_millis(timing.poll_timeout_ms.max(1)),
            tick: Duration::from_millis(timing.tick_ms),
            completeness_timeout: Duration::from_millis(timing.completeness_timeout_ms),
            kernel_info_timeout: Duration::from_millis(timing.kernel_info_timeout_ms),
            shutdown_grace: Duration::from_millis(timing.shutdown_grace_ms),
        }
    }
}

/// Settings of the `kconsole` binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Pre-fill continuation prompts with the kernel's indent hint.
    pub auto_indent: bool,
    /// Log media rendering at debug level.
    pub image_debug: bool,
    /// Viewer command line; media is written to a temp file appended as the
    /// last argument.
    pub viewer: String,
    /// Capacity of the render queue.
    pub render_queue: usize,
    /// Prompt history file. Defaults to a per-filetype file in the data dir.
    pub history_file: Option<PathBuf>,
    pub timing: TimingConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            auto_indent: false,
            image_debug: false,
            viewer: "timg -p q".to_string(),
            render_queue: 8,
            history_file: None,
            timing: TimingConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load the configuration.
    ///
    /// # Errors
    /// Returns error if an explicit file is unreadable, or if any file found
    /// is not valid TOML for this schema.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse one configuration file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Engine timings as durations.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::from(&self.timing)
    }

    /// History file for a language, if any location is available.
    #[must_use]
    pub fn history_path(&self, filetype: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = &self.history_file {
            return Some(path.clone());
        }
        let name = format!("history-{}", filetype.unwrap_or("default"));
        dirs::data_dir().map(|dir| dir.join(APP_DIR).join(name))
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}
