//! # Services
//!
//! Services and the secret references that determine which secrets they mount.

use super::secret::SecretObject;
use serde::{Deserialize, Serialize};

/// Where and how a secret is mounted inside the service's containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretFile {
    /// Target filename under `/run/secrets`
    pub name: String,
    #[serde(rename = "UID")]
    pub uid: String,
    #[serde(rename = "GID")]
    pub gid: String,
    pub mode: u32,
}

/// A service's binding to one secret
///
/// Serialized in the Docker Engine `SecretReference` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecretReference {
    pub file: SecretFile,
    #[serde(rename = "SecretID")]
    pub secret_id: String,
    pub secret_name: String,
}

impl SecretReference {
    /// Same mount (filename, owner, mode) pointing at another secret
    pub fn rebound_to(&self, secret: &SecretObject) -> Self {
        Self {
            file: self.file.clone(),
            secret_id: secret.id.clone(),
            secret_name: secret.name.clone(),
        }
    }
}

/// A service as seen by the rebinder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Store version index, required for optimistic-concurrency updates
    pub version: u64,
    /// `None` when the service spec carries no secrets structure at all
    pub secrets: Option<Vec<SecretReference>>,
}
