//! # Secret Objects
//!
//! Immutable, named, labelled blobs held by the orchestrator.

use super::name::SecretName;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// Secret labels (access-control metadata read by downstream consumers)
pub type Labels = BTreeMap<String, String>;

/// A secret as listed by the secret store
///
/// The payload is never returned by the store, only identity and labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretObject {
    /// Opaque store identifier
    pub id: String,
    pub name: String,
    pub labels: Labels,
}

/// Certificate material, wiped from memory on drop
#[derive(Clone, Default)]
pub struct SecretPayload(Zeroizing<Vec<u8>>);

impl SecretPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex SHA-256 of the payload, safe to log
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(self.as_bytes()))
    }
}

impl PartialEq for SecretPayload {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SecretPayload {}

impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretPayload(<{} bytes redacted>)", self.len())
    }
}

impl From<Vec<u8>> for SecretPayload {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretPayload {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

/// Request to create a secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSecret {
    pub name: SecretName,
    pub payload: SecretPayload,
    pub labels: Labels,
}
