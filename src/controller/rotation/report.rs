//! # Rotation Reports
//!
//! Per-item outcomes of every stage. A run that returns `Ok` may still
//! contain failures when the `continue` policy is active.

use crate::model::{SecretKind, VersionStamp};
use std::collections::BTreeSet;

/// Result of minting one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    Minted {
        kind: SecretKind,
        name: String,
        /// SHA-256 of the payload
        fingerprint: String,
    },
    Failed {
        kind: SecretKind,
        name: String,
        error: String,
    },
}

impl MintOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, MintOutcome::Failed { .. })
    }
}

/// Why a service was left alone without being inspected further
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The service spec has no secret references at all
    NoSecrets,
}

/// Result of rebinding one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    Updated {
        service: String,
        /// Secret names the service referenced before the update
        replaced: Vec<String>,
    },
    /// References secrets, none of them rotating
    Unchanged { service: String },
    Skipped { service: String, reason: SkipReason },
    Failed {
        service: String,
        /// Secret names the service still references
        references: Vec<String>,
        error: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebindReport {
    pub outcomes: Vec<ServiceOutcome>,
}

impl RebindReport {
    pub fn updated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ServiceOutcome::Updated { .. }))
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ServiceOutcome::Failed { .. }))
            .count()
    }

    /// Names still mounted by services whose update failed
    ///
    /// The sweeper must not delete any of these.
    pub fn protected_names(&self) -> BTreeSet<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ServiceOutcome::Failed { references, .. } => Some(references.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Result of one sweep action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Deleted { kind: SecretKind, name: String },
    /// Superseded, but still mounted by a service that could not be rebound
    Retained { kind: SecretKind, name: String },
    DeleteFailed {
        kind: SecretKind,
        name: String,
        error: String,
    },
    AliasRefreshed { kind: SecretKind, name: String },
    /// Alias left as it was because the old one could not be removed
    AliasKept { kind: SecretKind, name: String },
    AliasFailed {
        kind: SecretKind,
        name: String,
        error: String,
    },
}

impl SweepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SweepOutcome::DeleteFailed { .. } | SweepOutcome::AliasFailed { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub outcomes: Vec<SweepOutcome>,
}

impl SweepReport {
    pub fn deleted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SweepOutcome::Deleted { .. }))
            .count()
    }

    pub fn refreshed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SweepOutcome::AliasRefreshed { .. }))
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }
}

/// Everything a rotation run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    pub stamp: VersionStamp,
    pub minted: Vec<MintOutcome>,
    pub services: RebindReport,
    pub sweep: SweepReport,
}

impl RotationReport {
    pub fn new(stamp: VersionStamp) -> Self {
        Self {
            stamp,
            minted: Vec::new(),
            services: RebindReport::default(),
            sweep: SweepReport::default(),
        }
    }

    pub fn minted_count(&self) -> usize {
        self.minted.iter().filter(|o| !o.is_failure()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.minted.iter().filter(|o| o.is_failure()).count()
            + self.services.failure_count()
            + self.sweep.failure_count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}
