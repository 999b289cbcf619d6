//! Serializable construction parameters.
//!
//! Durations are written as short strings ("5s", "500ms", "2m"); a bare
//! number is taken as seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while interpreting configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),
}

/// Scheduler parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Normal run interval (e.g., "5m"). "0s" runs only on trigger.
    pub run_interval: String,
    /// Base retry interval after a failed run (e.g., "5s"). "0s" disables retry.
    #[serde(default = "zero")]
    pub retry_interval: String,
    /// Double the retry interval on consecutive failures.
    #[serde(default = "enabled")]
    pub backoff: bool,
    /// Catch panics raised by the task instead of ending the loop.
    #[serde(default = "enabled")]
    pub recover_panics: bool,
}

impl ScheduleConfig {
    pub fn run_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.run_interval)
    }

    pub fn retry_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.retry_interval)
    }
}

/// Health checker parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCheckConfig {
    /// State before any observation.
    #[serde(default)]
    pub initial_up: bool,
    /// Consecutive successes before going from down to up.
    #[serde(default = "one")]
    pub up_threshold: u32,
    /// Consecutive failures before going from up to down.
    #[serde(default = "three")]
    pub down_threshold: u32,
    /// Let the first observation set the state directly.
    #[serde(default)]
    pub fast_start: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            initial_up: false,
            up_threshold: one(),
            down_threshold: three(),
            fast_start: false,
        }
    }
}

fn zero() -> String {
    "0s".to_string()
}

fn enabled() -> bool {
    true
}

fn one() -> u32 {
    1
}

fn three() -> u32 {
    3
}

/// Parse a duration string like "5s", "500ms", "2m".
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().map(Duration::from_millis).map_err(|_| invalid())
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins = mins.parse::<u64>().map_err(|_| invalid())?;
        mins.checked_mul(60).map(Duration::from_secs).ok_or_else(invalid)
    } else {
        s.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration(" 30s "), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn parse_duration_milliseconds() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
    }

    #[test]
    fn parse_duration_minutes() {
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    }

    #[test]
    fn parse_duration_plain_number_as_seconds() {
        assert_eq!(parse_duration("10"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert_eq!(
            parse_duration("soon"),
            Err(ConfigError::InvalidDuration("soon".to_string()))
        );
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_duration_rejects_overflowing_minutes() {
        assert_eq!(
            parse_duration("999999999999999999m"),
            Err(ConfigError::InvalidDuration("999999999999999999m".to_string()))
        );
        assert_eq!(parse_duration("1000m"), Ok(Duration::from_secs(60_000)));
    }

    #[test]
    fn schedule_config_defaults() {
        let config: ScheduleConfig = toml::from_str(r#"run_interval = "5m""#).unwrap();
        assert_eq!(config.run_interval(), Ok(Duration::from_secs(300)));
        assert_eq!(config.retry_interval(), Ok(Duration::ZERO));
        assert!(config.backoff);
        assert!(config.recover_panics);
    }

    #[test]
    fn schedule_config_full() {
        let config: ScheduleConfig = toml::from_str(
            r#"
            run_interval = "1m"
            retry_interval = "500ms"
            backoff = false
            recover_panics = false
            "#,
        )
        .unwrap();
        assert_eq!(config.retry_interval(), Ok(Duration::from_millis(500)));
        assert!(!config.backoff);
        assert!(!config.recover_panics);
    }

    #[test]
    fn health_config_defaults() {
        let config: HealthCheckConfig = toml::from_str("").unwrap();
        assert_eq!(config, HealthCheckConfig::default());
        assert_eq!(config.up_threshold, 1);
        assert_eq!(config.down_threshold, 3);
        assert!(!config.initial_up);
        assert!(!config.fast_start);
    }

    #[test]
    fn health_config_overrides() {
        let config: HealthCheckConfig = toml::from_str(
            r#"
            initial_up = true
            up_threshold = 3
            down_threshold = 5
            fast_start = true
            "#,
        )
        .unwrap();
        assert!(config.initial_up);
        assert_eq!((config.up_threshold, config.down_threshold), (3, 5));
        assert!(config.fast_start);
    }
}
