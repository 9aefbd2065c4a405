//! Environment-variable settings.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_WORKERS_CONCURRENCY: &str = "ORCH_WORKERS_CONCURRENCY";
pub const ENV_LISTENER_CONCURRENCY: &str = "ORCH_LISTENER_CONCURRENCY";
pub const ENV_JOBS_DEFAULT_INTERVAL_MS: &str = "ORCH_JOBS_DEFAULT_INTERVAL_MS";
pub const ENV_HTTP_AGENT: &str = "ORCH_HTTP_AGENT";
pub const ENV_REPOSITORY_CONFIGURATION: &str = "ORCH_REPOSITORY_CONFIGURATION";
pub const ENV_SWORDV2_SLEEP_TIME_MS: &str = "ORCH_SWORDV2_SLEEP_TIME_MS";
pub const ENV_REPOSITORY_URL: &str = "CONVEYOR_REPOSITORY_URL";
pub const ENV_REPOSITORY_USERNAME: &str = "CONVEYOR_REPOSITORY_USERNAME";
pub const ENV_REPOSITORY_PASSWORD: &str = "CONVEYOR_REPOSITORY_PASSWORD";
pub const ENV_DAEMON_ADDR: &str = "CONVEYOR_DAEMON_ADDR";

/// Everything the process reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Deposit worker pool size.
    pub workers_concurrency: usize,
    /// Listener pool size, applied to the submission and deposit pools each.
    pub listener_concurrency: usize,
    /// Period of the daemon's background refresh job.
    pub jobs_interval: Duration,
    /// Self-identifying user-agent; upstream events attributed to it are
    /// dropped.
    pub http_agent: String,
    /// URI of the target registry document.
    pub registry_location: String,
    /// Minimum wait between a submit and the first status refresh.
    pub first_refresh_delay: Duration,
    /// Base URL of the upstream entity store.
    pub repository_base_url: String,
    pub repository_username: Option<String>,
    pub repository_password: Option<String>,
    /// Bind address of the daemon's HTTP surface.
    pub daemon_addr: SocketAddr,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            workers_concurrency: parse_usize(ENV_WORKERS_CONCURRENCY, var(ENV_WORKERS_CONCURRENCY), 4)?,
            listener_concurrency: parse_usize(
                ENV_LISTENER_CONCURRENCY,
                var(ENV_LISTENER_CONCURRENCY),
                4,
            )?,
            jobs_interval: parse_millis(
                ENV_JOBS_DEFAULT_INTERVAL_MS,
                var(ENV_JOBS_DEFAULT_INTERVAL_MS),
                600_000,
            )?,
            http_agent: var(ENV_HTTP_AGENT)
                .unwrap_or_else(|| format!("conveyor/{}", env!("CARGO_PKG_VERSION"))),
            registry_location: require(ENV_REPOSITORY_CONFIGURATION)?,
            first_refresh_delay: parse_millis(
                ENV_SWORDV2_SLEEP_TIME_MS,
                var(ENV_SWORDV2_SLEEP_TIME_MS),
                10_000,
            )?,
            repository_base_url: require(ENV_REPOSITORY_URL)?,
            repository_username: var(ENV_REPOSITORY_USERNAME),
            repository_password: var(ENV_REPOSITORY_PASSWORD),
            daemon_addr: parse_addr(ENV_DAEMON_ADDR, var(ENV_DAEMON_ADDR))?,
        })
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    var(name).ok_or(ConfigError::MissingVar { name })
}

fn parse_usize(
    name: &'static str,
    raw: Option<String>,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let parsed = raw.trim().parse::<usize>().map_err(|e| ConfigError::InvalidVar {
        name,
        value: raw.clone(),
        detail: e.to_string(),
    })?;
    if parsed == 0 {
        return Err(ConfigError::InvalidVar {
            name,
            value: raw,
            detail: "must be at least 1".into(),
        });
    }
    Ok(parsed)
}

fn parse_millis(
    name: &'static str,
    raw: Option<String>,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_millis(default_ms));
    };
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidVar {
            name,
            value: raw,
            detail: e.to_string(),
        })
}

fn parse_addr(name: &'static str, raw: Option<String>) -> Result<SocketAddr, ConfigError> {
    let Some(raw) = raw else {
        return Ok(SocketAddr::from(([127, 0, 0, 1], 8877)));
    };
    raw.trim().parse().map_err(|_| ConfigError::InvalidVar {
        name,
        value: raw,
        detail: "expected host:port".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_fall_back_to_defaults() {
        assert_eq!(parse_usize(ENV_WORKERS_CONCURRENCY, None, 4).unwrap(), 4);
        assert_eq!(
            parse_millis(ENV_JOBS_DEFAULT_INTERVAL_MS, None, 600_000).unwrap(),
            Duration::from_millis(600_000)
        );
        assert_eq!(
            parse_addr(ENV_DAEMON_ADDR, None).unwrap(),
            SocketAddr::from(([127, 0, 0, 1], 8877))
        );
    }

    #[test]
    fn present_values_are_parsed() {
        assert_eq!(
            parse_usize(ENV_WORKERS_CONCURRENCY, Some("8".into()), 4).unwrap(),
            8
        );
        assert_eq!(
            parse_millis(ENV_SWORDV2_SLEEP_TIME_MS, Some("2500".into()), 10_000).unwrap(),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn garbage_and_zero_are_rejected() {
        assert!(parse_usize(ENV_WORKERS_CONCURRENCY, Some("many".into()), 4).is_err());
        assert!(parse_usize(ENV_WORKERS_CONCURRENCY, Some("0".into()), 4).is_err());
        assert!(parse_millis(ENV_JOBS_DEFAULT_INTERVAL_MS, Some("-5".into()), 1).is_err());
        assert!(parse_addr(ENV_DAEMON_ADDR, Some("nowhere".into())).is_err());
    }
}
