//! `steward probe` — TCP connect health check.

use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use steward_core::{HealthCheckConfig, RunError, RunResult, ScheduleConfig};
use steward_health::HealthChecker;
use steward_scheduler::Scheduler;

/// Probe parameters, from flags or a TOML file.
#[derive(Debug, Deserialize)]
pub struct ProbeSettings {
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub health: HealthCheckConfig,
}

impl ProbeSettings {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: ProbeSettings = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn from_flags(
        interval: Duration,
        retry: Duration,
        up: u32,
        down: u32,
        fast_start: bool,
    ) -> Self {
        Self {
            schedule: ScheduleConfig {
                run_interval: format!("{}ms", interval.as_millis()),
                retry_interval: format!("{}ms", retry.as_millis()),
                backoff: true,
                recover_panics: true,
            },
            health: HealthCheckConfig {
                initial_up: false,
                up_threshold: up,
                down_threshold: down,
                fast_start,
            },
        }
    }
}

/// Connect to `address` once; success means something is listening.
fn connect(address: &str, timeout: Duration) -> RunResult {
    let addr = address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| RunError::msg(format!("no address resolved for {address}")))?;
    TcpStream::connect_timeout(&addr, timeout)?;
    Ok(())
}

/// Build a scheduler driving a health checker around a TCP probe.
pub fn scheduler(
    address: String,
    timeout: Duration,
    settings: &ProbeSettings,
) -> anyhow::Result<Scheduler> {
    let target = address.clone();
    let check = move || connect(&target, timeout);

    let up_address = address.clone();
    let down_address = address;
    let checker = HealthChecker::from_config(check, &settings.health)
        .on_up(move |ups, _| info!(address = %up_address, ups, "target is up"))
        .on_down(move |_, downs, err| {
            let error = err.map(ToString::to_string).unwrap_or_default();
            warn!(address = %down_address, downs, %error, "target is down");
        });

    let scheduler = Scheduler::from_config(Arc::new(checker), &settings.schedule)?;
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn connect_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        assert!(connect(&address, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn connect_fails_on_bad_address() {
        assert!(connect("not an address", Duration::from_millis(100)).is_err());
    }

    #[test]
    fn settings_from_toml() {
        let settings: ProbeSettings = toml::from_str(
            r#"
            [schedule]
            run_interval = "10s"
            retry_interval = "1s"

            [health]
            up_threshold = 2
            down_threshold = 5
            "#,
        )
        .unwrap();
        assert_eq!(settings.schedule.run_interval().unwrap(), Duration::from_secs(10));
        assert_eq!(settings.health.down_threshold, 5);
        assert!(settings.schedule.backoff);
    }

    #[test]
    fn settings_from_flags_round_trip_durations() {
        let settings = ProbeSettings::from_flags(
            Duration::from_secs(5),
            Duration::from_millis(250),
            1,
            3,
            true,
        );
        assert_eq!(settings.schedule.run_interval().unwrap(), Duration::from_secs(5));
        assert_eq!(settings.schedule.retry_interval().unwrap(), Duration::from_millis(250));
        assert!(settings.health.fast_start);
    }

    #[test]
    fn scheduler_from_settings() {
        let settings = ProbeSettings::from_flags(
            Duration::from_secs(5),
            Duration::from_secs(1),
            1,
            3,
            false,
        );
        let scheduler =
            scheduler("127.0.0.1:1".to_string(), Duration::from_millis(50), &settings).unwrap();
        assert_eq!(scheduler.policy().run_interval(), Duration::from_secs(5));
        assert_eq!(scheduler.policy().retry_interval(), Duration::from_secs(1));
    }
}
