//! # Daemon Configuration
//!
//! Settings for the renewal loop.

use super::{parse_or_default, ConfigError, Environment};
use crate::constants::{
    DEFAULT_RENEWAL_COMMAND, DEFAULT_RENEWAL_INTERVAL_MINUTES, DEFAULT_ROTATION_METRICS_DIR,
    SHORT_RENEWAL_INTERVAL_MINUTES,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// `DOMAIN`: the certificate's primary domain
    pub domain: String,
    /// `INTERVAL`: minutes between renewal checks, `0` runs once and exits
    pub interval_minutes: u64,
    /// `RENEWAL_COMMAND`: ACME client executable
    pub renewal_command: String,
    /// `METRICS_PORT`: serve health probes and metrics when set
    pub metrics_port: Option<u16>,
    /// `ROTATION_METRICS_DIR`: where the deploy hook leaves its rotation
    /// metrics. Only used when metrics are served.
    pub rotation_metrics_dir: Option<PathBuf>,
}

impl DaemonConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env(env: &Environment) -> Result<Self, ConfigError> {
        let domain = env
            .get("DOMAIN")
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(ConfigError::Missing("DOMAIN"))?
            .to_string();

        let renewal_command = env
            .get("RENEWAL_COMMAND")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_RENEWAL_COMMAND)
            .to_string();

        let metrics_port = match env.get("METRICS_PORT") {
            None => None,
            Some(_) => Some(parse_or_default(env, "METRICS_PORT", 0u16)?),
        };

        let rotation_metrics_dir = metrics_port.map(|_| {
            env.get("ROTATION_METRICS_DIR")
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_ROTATION_METRICS_DIR), PathBuf::from)
        });

        Ok(Self {
            domain,
            interval_minutes: parse_or_default(env, "INTERVAL", DEFAULT_RENEWAL_INTERVAL_MINUTES)?,
            renewal_command,
            metrics_port,
            rotation_metrics_dir,
        })
    }

    /// Pause between runs, `None` when the daemon should run once
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_minutes > 0).then(|| Duration::from_secs(self.interval_minutes * 60))
    }

    /// Whether the interval is set but shorter than is sensible for renewal checks
    pub fn interval_is_short(&self) -> bool {
        self.interval_minutes > 0 && self.interval_minutes < SHORT_RENEWAL_INTERVAL_MINUTES
    }
}
