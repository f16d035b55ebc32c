//! Core configuration.

use crate::pipeline::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings that select and shape one controller instance.
///
/// Every field has a default, so a partial JSON/TOML document is enough:
///
/// ```
/// let config: hashvisor::lifecycle::CoreConfig =
///     serde_json::from_str(r#"{ "instance": "rig-2" }"#).unwrap();
/// assert_eq!(config.instance, "rig-2");
/// assert_eq!(config.default_loglevel.0, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Selects which persisted configuration is loaded and saved.
    pub instance: String,
    /// Threshold for the pre-startup fallback output.
    pub default_loglevel: LogLevel,
    pub config_dir: PathBuf,
    /// Upper bound on waiting for a dispatcher to drain at shutdown.
    pub dispatcher_join_timeout_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            instance: "default".to_string(),
            default_loglevel: LogLevel::INFO,
            config_dir: PathBuf::from("config"),
            dispatcher_join_timeout_secs: 10,
        }
    }
}

impl CoreConfig {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            ..Default::default()
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_default_loglevel(mut self, level: LogLevel) -> Self {
        self.default_loglevel = level;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher_join_timeout_secs = timeout.as_secs();
        self
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatcher_join_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: CoreConfig = serde_json::from_str(r#"{ "default_loglevel": 700 }"#).unwrap();
        assert_eq!(config.instance, "default");
        assert_eq!(config.default_loglevel, LogLevel::DEBUG);
        assert_eq!(config.config_dir, PathBuf::from("config"));
        assert_eq!(config.join_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = CoreConfig::new("rig")
            .with_config_dir("/tmp/hv")
            .with_default_loglevel(LogLevel::ERROR)
            .with_join_timeout(Duration::from_secs(2));
        assert_eq!(config.instance, "rig");
        assert_eq!(config.config_dir, PathBuf::from("/tmp/hv"));
        assert_eq!(config.default_loglevel, LogLevel::ERROR);
        assert_eq!(config.dispatcher_join_timeout_secs, 2);
    }
}
