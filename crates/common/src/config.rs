//! Application configuration

use crate::sync::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "regioncast.json";

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output pipeline defaults.
    pub output: OutputConfig,

    /// Shared-surface lock retry schedule.
    pub sync: SyncConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Frame Surface Manager defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Initial target width before the first selection.
    pub initial_width: u32,

    /// Initial target height before the first selection.
    pub initial_height: u32,

    /// Tick interval of the cooperative loop, in milliseconds.
    pub tick_interval_ms: u64,
}

/// Keyed-mutex acquisition schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Per-attempt wait for the surface key, in milliseconds.
    pub acquire_timeout_ms: u64,

    /// Attempts before a stalled peer is reported as fatal.
    pub max_attempts: u32,

    /// Pause between attempts, in milliseconds.
    pub retry_interval_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "regioncast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            initial_width: 1920,
            initial_height: 1080,
            tick_interval_ms: 16,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            acquire_timeout_ms: policy.acquire_timeout.as_millis() as u64,
            max_attempts: policy.max_attempts,
            retry_interval_ms: policy.retry_interval.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SyncConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            max_attempts: self.max_attempts,
            retry_interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}

impl AppConfig {
    /// Load configuration from `regioncast.json` next to the executable,
    /// falling back to defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = match default_config_path() {
            Some(path) => path,
            None => return Self::default(),
        };

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.sync.max_attempts, config.sync.max_attempts);
        assert_eq!(parsed.output.initial_width, 1920);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "sync": { "max_attempts": 7 } }"#).unwrap();

        assert_eq!(parsed.sync.max_attempts, 7);
        assert_eq!(parsed.output.initial_height, 1080);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn retry_policy_reflects_config() {
        let sync = SyncConfig {
            acquire_timeout_ms: 25,
            max_attempts: 4,
            retry_interval_ms: 5,
        };

        let policy = sync.retry_policy();
        assert_eq!(policy.acquire_timeout, Duration::from_millis(25));
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.retry_interval, Duration::from_millis(5));
    }
}
