//! # Configuration
//!
//! Configuration loaded from environment variables.
//!
//! Every loader reads from an [`Environment`] snapshot rather than the live
//! process environment, so `_FILE` indirection is resolved once and the
//! loaders can be exercised in tests without touching global state.

mod daemon;
mod docker;
mod environment;
mod rotation;

pub use daemon::DaemonConfig;
pub use docker::{DockerConfig, DockerEndpoint, TlsSettings};
pub use environment::Environment;
pub use rotation::{FailurePolicy, RotationConfig};

use thiserror::Error;

/// Configuration that cannot be used
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or_default<T>(env: &Environment, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env.get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Interpret a boolean-ish variable the way the Docker CLI does: set and not "0"/"false"
fn is_truthy(env: &Environment, var: &str) -> bool {
    env.get(var)
        .map(str::trim)
        .is_some_and(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
}
