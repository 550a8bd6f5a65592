//! # Environment Snapshot
//!
//! A copy of the process environment with `_FILE` indirection resolved.
//!
//! For every variable `X_FILE` whose value is the path of an existing file,
//! `X` is set to the file's trimmed contents. This is how Docker secrets
//! (mounted under `/run/secrets`) are fed into configuration.

use crate::constants::FILE_VALUE_SUFFIX;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Build a snapshot from explicit variables, without indirection
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Replace `X` with the contents of the file named by `X_FILE`
    ///
    /// Variables whose `_FILE` value is not an existing file are left alone.
    #[must_use]
    pub fn resolve_file_indirection(mut self) -> Self {
        let indirections: Vec<(String, String)> = self
            .vars
            .iter()
            .filter_map(|(key, value)| {
                let target = key.strip_suffix(FILE_VALUE_SUFFIX)?;
                (!target.is_empty() && Path::new(value).is_file())
                    .then(|| (target.to_string(), value.clone()))
            })
            .collect();

        for (target, path) in indirections {
            match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    info!("Using contents of {} for value of {}", path, target);
                    self.vars.insert(target, contents.trim().to_string());
                }
                Err(e) => {
                    warn!("Failed to read {} for value of {}: {}", path, target, e);
                }
            }
        }

        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Set a variable on the snapshot (the process environment is untouched)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// Values may be credentials; only keys are printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_indirection_reads_trimmed_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  hunter2  ").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let env = Environment::from_vars([("PASSWORD_FILE", path.as_str())])
            .resolve_file_indirection();

        assert_eq!(env.get("PASSWORD"), Some("hunter2"));
        assert_eq!(env.get("PASSWORD_FILE"), Some(path.as_str()));
    }

    #[test]
    fn test_file_indirection_overrides_plain_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "from-file").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let env = Environment::from_vars([("TOKEN", "inline"), ("TOKEN_FILE", path.as_str())])
            .resolve_file_indirection();

        assert_eq!(env.get("TOKEN"), Some("from-file"));
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let env = Environment::from_vars([("TOKEN_FILE", "/definitely/not/here")])
            .resolve_file_indirection();
        assert!(!env.contains("TOKEN"));
    }

    #[test]
    fn test_debug_hides_values() {
        let env = Environment::from_vars([("SECRET", "value")]);
        let debug = format!("{env:?}");
        assert!(debug.contains("SECRET"));
        assert!(!debug.contains("value"));
    }
}
