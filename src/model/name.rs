//! # Secret Names
//!
//! Validated secret names and the version stamps embedded in them.
//!
//! Two shapes exist for every kind and domain:
//!
//! - unversioned alias: `{prefix}_{domain}`
//! - versioned snapshot: `{prefix}_{domain}_{stamp}`

use crate::constants::{MAX_SECRET_NAME_LEN, VERSION_STAMP_FORMAT};
use chrono::{DateTime, Local, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Docker (swarmkit) secret name rule
static SECRET_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]+(?:[a-zA-Z0-9_.-]*[a-zA-Z0-9])?$")
        .expect("secret name regex is valid")
});

/// Secret name validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("secret name cannot be empty")]
    Empty,
    #[error("secret name '{name}' is {len} characters long, the maximum is {max}")]
    TooLong { name: String, len: usize, max: usize },
    #[error("secret name '{0}' must only contain [a-zA-Z0-9-_.] and start and end with a letter or digit")]
    InvalidCharacters(String),
}

/// A secret name accepted by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretName(String);

impl SecretName {
    /// Validate a secret name
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.len() > MAX_SECRET_NAME_LEN {
            return Err(NameError::TooLong {
                len: name.len(),
                name,
                max: MAX_SECRET_NAME_LEN,
            });
        }
        if !SECRET_NAME_RE.is_match(&name) {
            return Err(NameError::InvalidCharacters(name));
        }
        Ok(Self(name))
    }

    /// Stable alias `{prefix}_{domain}`
    pub fn unversioned(prefix: &str, domain: &str) -> Result<Self, NameError> {
        Self::new(format!("{prefix}_{domain}"))
    }

    /// Snapshot `{prefix}_{domain}_{stamp}`
    pub fn versioned(prefix: &str, domain: &str, stamp: &VersionStamp) -> Result<Self, NameError> {
        Self::new(format!("{prefix}_{domain}_{stamp}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `name` is this alias itself or a versioned snapshot of it
    ///
    /// This is narrower than a bare `starts_with(alias)`: matching on the `_`
    /// separator keeps `cert_example.com` from claiming
    /// `cert_example.com.au`, and a name such as `cert_example.comX` is
    /// neither rebound nor swept. Rebinder and sweeper both go through this
    /// rule, so a name is only ever deleted after services were moved off it.
    pub fn covers(&self, name: &str) -> bool {
        match name.strip_prefix(self.0.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('_'),
            None => false,
        }
    }
}

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SecretName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SecretName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SecretName> for String {
    fn from(value: SecretName) -> Self {
        value.0
    }
}

impl PartialEq<str> for SecretName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SecretName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Replace every character not allowed in a secret name with `.`
pub fn sanitize_name_component(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '.'
            }
        })
        .collect()
}

/// Timestamp of a rotation run, as embedded in versioned secret names
///
/// Seconds precision: two runs produce distinct names whenever their start
/// times differ by at least one second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionStamp(String);

impl VersionStamp {
    /// Stamp for a run starting now, in local time
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime<Tz>(at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self::new(&at.format(VERSION_STAMP_FORMAT).to_string())
    }

    /// Build a stamp from an arbitrary string, normalizing disallowed characters
    pub fn new(raw: &str) -> Self {
        Self(sanitize_name_component(raw.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
