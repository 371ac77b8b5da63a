use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, ensure};

pub const DEFAULT_SCHEDULER_BASE_URL: &str = "http://localhost:9889";
pub const DEFAULT_PARTITION: &str = "default";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 15_000;
pub const DEFAULT_TRANSITION_MS: u64 = 750;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSettings {
    pub scheduler_base_url: String,
    pub partition: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub refresh_interval_ms: u64,
    pub transition_ms: u64,
    pub state_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            scheduler_base_url: DEFAULT_SCHEDULER_BASE_URL.to_owned(),
            partition: DEFAULT_PARTITION.to_owned(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            transition_ms: DEFAULT_TRANSITION_MS,
            state_file: None,
            log_dir: None,
        }
    }
}

impl DashboardSettings {
    pub fn from_env() -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();

        let scheduler_base_url = env::var("SCHEDULER_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_SCHEDULER_BASE_URL.to_owned());
        ensure!(
            !scheduler_base_url.trim().is_empty(),
            "SCHEDULER_BASE_URL cannot be empty"
        );

        let partition =
            env::var("SCHEDULER_PARTITION").unwrap_or_else(|_| DEFAULT_PARTITION.to_owned());
        ensure!(
            !partition.trim().is_empty(),
            "SCHEDULER_PARTITION cannot be empty"
        );

        let request_timeout_ms = parse_u64_env("SCHEDULER_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        ensure!(
            request_timeout_ms > 0,
            "SCHEDULER_TIMEOUT_MS must be greater than 0"
        );

        let max_retries = parse_u32_env("SCHEDULER_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;

        let refresh_interval_ms =
            parse_u64_env("REFRESH_INTERVAL_MS", DEFAULT_REFRESH_INTERVAL_MS)?;
        ensure!(
            refresh_interval_ms > 0,
            "REFRESH_INTERVAL_MS must be greater than 0"
        );

        let transition_ms = parse_u64_env("TRANSITION_MS", DEFAULT_TRANSITION_MS)?;
        ensure!(transition_ms > 0, "TRANSITION_MS must be greater than 0");

        Ok(Self {
            scheduler_base_url: scheduler_base_url.trim_end_matches('/').to_owned(),
            partition: partition.trim().to_owned(),
            request_timeout_ms,
            max_retries,
            refresh_interval_ms,
            transition_ms,
            state_file: read_optional_env("DASHBOARD_STATE_FILE").map(PathBuf::from),
            log_dir: read_optional_env("DASHBOARD_LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }
}

fn read_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn parse_u32_env(name: &str, default: u32) -> Result<u32> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .with_context(|| format!("failed to parse {name} as u32")),
        Err(_) => Ok(default),
    }
}

fn parse_u64_env(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("failed to parse {name} as u64")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DEFAULT_SCHEDULER_BASE_URL, DashboardSettings};

    #[test]
    fn defaults_match_documented_values() {
        let settings = DashboardSettings::default();
        assert_eq!(settings.scheduler_base_url, DEFAULT_SCHEDULER_BASE_URL);
        assert_eq!(settings.partition, "default");
        assert_eq!(settings.request_timeout_ms, 5_000);
        assert_eq!(settings.refresh_interval(), Duration::from_secs(15));
        assert_eq!(settings.transition(), Duration::from_millis(750));
        assert_eq!(settings.state_file, None);
    }
}
