//! # Rotation Plan
//!
//! The ephemeral description of one run: domain, stamp, and for every
//! configured kind the alias, the new versioned name and the source file.

use crate::config::{FailurePolicy, RotationConfig};
use crate::model::{NameError, SecretKind, SecretName, VersionStamp};
use std::path::{Path, PathBuf};

/// The four files written by the ACME client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFiles {
    pub key: PathBuf,
    pub cert: PathBuf,
    pub fullchain: PathBuf,
    pub chain: PathBuf,
}

impl CertificateFiles {
    pub fn path(&self, kind: SecretKind) -> &Path {
        match kind {
            SecretKind::PrivateKey => &self.key,
            SecretKind::Certificate => &self.cert,
            SecretKind::FullChain => &self.fullchain,
            SecretKind::Chain => &self.chain,
        }
    }
}

/// One kind taking part in the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationTarget {
    pub kind: SecretKind,
    /// `{prefix}_{domain}`
    pub alias: SecretName,
    /// `{prefix}_{domain}_{stamp}`
    pub versioned: SecretName,
    pub source: PathBuf,
}

impl RotationTarget {
    /// Whether a secret of this name belongs to this kind (alias or any snapshot)
    pub fn covers(&self, name: &str) -> bool {
        self.alias.covers(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    pub domain: String,
    pub stamp: VersionStamp,
    pub policy: FailurePolicy,
    targets: Vec<RotationTarget>,
}

impl RotationPlan {
    /// Plan a run for every kind configured in `config`
    ///
    /// All names are validated up front, so a bad prefix or domain fails
    /// before anything is created.
    pub fn new(
        config: &RotationConfig,
        domain: &str,
        files: &CertificateFiles,
        stamp: VersionStamp,
    ) -> Result<Self, NameError> {
        let targets = config
            .kinds()
            .map(|(kind, prefix)| -> Result<RotationTarget, NameError> {
                Ok(RotationTarget {
                    kind,
                    alias: SecretName::unversioned(prefix, domain)?,
                    versioned: SecretName::versioned(prefix, domain, &stamp)?,
                    source: files.path(kind).to_path_buf(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            domain: domain.to_string(),
            stamp,
            policy: config.failure_policy,
            targets,
        })
    }

    /// Targets in rotation order (key, cert, fullchain, chain)
    pub fn targets(&self) -> &[RotationTarget] {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
