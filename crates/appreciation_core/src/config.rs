//! Board runtime configuration.
//!
//! # Responsibility
//! - Carry the timing knobs for the watchdog and notifications plus logging
//!   settings, with defaults for every field.
//! - Parse JSON configuration files.
//!
//! # Invariants
//! - Durations are strictly positive after `validate`.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_NOTIFICATION_TTL_MS: u64 = 3_000;

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Timing and logging settings for one board.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    /// Upper bound for a pending write before it is reported as timed out.
    pub watchdog_timeout_ms: u64,
    /// How long a notification stays visible.
    pub notification_ttl_ms: u64,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: DEFAULT_WATCHDOG_TIMEOUT_MS,
            notification_ttl_ms: DEFAULT_NOTIFICATION_TTL_MS,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl BoardConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parses and validates JSON config text. Missing fields take defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "watchdog_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.notification_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "notification_ttl_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::{BoardConfig, ConfigError};
    use std::time::Duration;

    #[test]
    fn empty_object_uses_defaults() {
        let config = BoardConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BoardConfig::default());
        assert_eq!(config.watchdog_timeout(), Duration::from_secs(10));
        assert_eq!(config.notification_ttl(), Duration::from_secs(3));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config =
            BoardConfig::from_json_str(r#"{"watchdog_timeout_ms": 2500, "log_level": "warn"}"#)
                .unwrap();
        assert_eq!(config.watchdog_timeout_ms, 2500);
        assert_eq!(config.notification_ttl_ms, 3000);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn zero_durations_and_unknown_fields_are_rejected() {
        assert!(matches!(
            BoardConfig::from_json_str(r#"{"notification_ttl_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BoardConfig::from_json_str(r#"{"retries": 3}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reports_missing_file_path() {
        let err = BoardConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
