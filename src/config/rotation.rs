//! # Rotation Configuration
//!
//! Which secret kinds rotate, under which name prefix, and how failures are handled.

use super::{ConfigError, Environment};
use crate::model::SecretKind;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What a stage does when a store call fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the run at the first failed store call
    #[default]
    FailFast,
    /// Record the failure, skip what depends on it, and keep going
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" | "abort" => Ok(FailurePolicy::FailFast),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "unknown failure policy '{other}', expected 'fail-fast' or 'continue'"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => f.write_str("fail-fast"),
            FailurePolicy::Continue => f.write_str("continue"),
        }
    }
}

/// Rotation settings
///
/// A kind takes part in a run only if its prefix is configured
/// (`KEY_SECRET`, `CERT_SECRET`, `FULLCHAIN_SECRET`, `CHAIN_SECRET`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationConfig {
    prefixes: BTreeMap<SecretKind, String>,
    pub failure_policy: FailurePolicy,
}

impl RotationConfig {
    /// Load configuration from environment variables
    pub fn from_env(env: &Environment) -> Result<Self, ConfigError> {
        let prefixes = SecretKind::ALL
            .into_iter()
            .filter_map(|kind| {
                env.get(kind.prefix_env_var())
                    .map(|prefix| (kind, prefix.to_string()))
            })
            .collect();

        let failure_policy = match env.get("ROTATION_FAILURE_POLICY") {
            None => FailurePolicy::default(),
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: "ROTATION_FAILURE_POLICY",
                value: raw.to_string(),
                reason,
            })?,
        };

        Ok(Self {
            prefixes,
            failure_policy,
        })
    }

    /// Configure (or replace) the prefix for a kind
    #[must_use]
    pub fn with_prefix(mut self, kind: SecretKind, prefix: impl Into<String>) -> Self {
        self.prefixes.insert(kind, prefix.into());
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Configured kinds with their prefixes, in rotation order
    pub fn kinds(&self) -> impl Iterator<Item = (SecretKind, &str)> {
        self.prefixes.iter().map(|(kind, prefix)| (*kind, prefix.as_str()))
    }
}
