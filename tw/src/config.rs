//! Tickwork configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::event_loop::LoopConfig;

/// Environment variable naming a config file; `--config` takes precedence
pub const CONFIG_ENV: &str = "TICKWORK_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event loop settings
    #[serde(rename = "event-loop")]
    pub event_loop: LoopConfig,

    /// Defaults for the `tw` demo commands
    pub demo: DemoConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// `--config`, then `$TICKWORK_CONFIG`, then `.tickwork.yml` in the
    /// working directory, then the user config, then defaults. A file named
    /// by flag or environment must load; the others are skipped with a
    /// warning when broken.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = Self::requested_path(config_path, std::env::var_os(CONFIG_ENV)) {
            return Self::load_from_file(&path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tickwork.yml
        let local_config = PathBuf::from(".tickwork.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tickwork/tickwork.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tickwork").join("tickwork.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Path the caller asked for, by flag or environment
    fn requested_path(config_path: Option<&PathBuf>, env: Option<OsString>) -> Option<PathBuf> {
        config_path
            .cloned()
            .or_else(|| env.filter(|value| !value.is_empty()).map(PathBuf::from))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Burst parameters for the demo commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Throttle/debounce delay in milliseconds
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Time between calls in a burst in milliseconds
    #[serde(rename = "period-ms")]
    pub period_ms: u64,

    /// Calls per burst
    pub calls: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            delay_ms: 300,
            period_ms: 100,
            calls: 5,
        }
    }
}

impl DemoConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}
