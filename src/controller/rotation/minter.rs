//! # Version Minter
//!
//! Creates the versioned secret of every kind in the plan.
//!
//! All source files are read before the first store call, so a missing file
//! aborts the run with nothing created.

use super::labels::current_labels;
use super::plan::{RotationPlan, RotationTarget};
use super::report::MintOutcome;
use super::{RotationError, Stage};
use crate::config::FailurePolicy;
use crate::model::{Labels, NewSecret, SecretKind, SecretObject, SecretPayload};
use crate::observability::metrics;
use crate::provider::SecretStore;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// A versioned secret created in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedSecret {
    pub target: RotationTarget,
    /// The created secret, as returned by the store
    pub object: SecretObject,
    pub payload: SecretPayload,
}

impl MintedSecret {
    pub fn kind(&self) -> SecretKind {
        self.target.kind
    }
}

/// Kind to minted secret, in rotation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MintedSecrets(Vec<MintedSecret>);

impl MintedSecrets {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MintedSecret> {
        self.0.iter()
    }

    pub fn get(&self, kind: SecretKind) -> Option<&MintedSecret> {
        self.0.iter().find(|m| m.kind() == kind)
    }

    /// The minted secret whose kind a secret name belongs to
    ///
    /// First matching kind in rotation order wins.
    pub fn classify(&self, name: &str) -> Option<&MintedSecret> {
        self.0.iter().find(|m| m.target.covers(name))
    }

    /// Unversioned names of every kind that changed in this run
    pub fn changing_names(&self) -> Vec<&str> {
        self.0.iter().map(|m| m.target.alias.as_str()).collect()
    }
}

impl FromIterator<MintedSecret> for MintedSecrets {
    fn from_iter<I: IntoIterator<Item = MintedSecret>>(iter: I) -> Self {
        let mut minted: Vec<MintedSecret> = iter.into_iter().collect();
        minted.sort_by_key(MintedSecret::kind);
        Self(minted)
    }
}

/// Output of the mint stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MintReport {
    pub secrets: MintedSecrets,
    pub outcomes: Vec<MintOutcome>,
}

#[derive(Debug)]
pub struct VersionMinter<'a> {
    store: &'a dyn SecretStore,
    policy: FailurePolicy,
}

impl<'a> VersionMinter<'a> {
    pub fn new(store: &'a dyn SecretStore, policy: FailurePolicy) -> Self {
        Self { store, policy }
    }

    pub async fn mint(&self, plan: &RotationPlan) -> Result<MintReport, RotationError> {
        let span = info_span!(
            "rotation.mint",
            domain = %plan.domain,
            stamp = %plan.stamp,
            kinds = plan.targets().len()
        );

        async move {
            let mut sources = Vec::with_capacity(plan.targets().len());
            for target in plan.targets() {
                sources.push((target, read_source(target).await?));
            }

            let existing = self
                .store
                .list_secrets()
                .await
                .map_err(|e| RotationError::store(Stage::Mint, e))?;
            debug!("Found {} existing secrets", existing.len());

            let mut minted = Vec::new();
            let mut outcomes = Vec::new();
            for (target, payload) in sources {
                let labels = current_labels(&existing, &target.alias).unwrap_or_else(|| {
                    warn!(
                        "No existing secret named {} was found. It will be created.",
                        target.alias
                    );
                    Labels::new()
                });

                let fingerprint = payload.fingerprint();
                info!(
                    "Creating {} {} with labels {:?} (sha256 {})",
                    target.kind.description(),
                    target.versioned,
                    labels,
                    fingerprint
                );

                let request = NewSecret {
                    name: target.versioned.clone(),
                    payload,
                    labels,
                };
                match self.store.create_secret(&request).await {
                    Ok(object) => {
                        metrics::record_secret_minted(target.kind.as_str());
                        outcomes.push(MintOutcome::Minted {
                            kind: target.kind,
                            name: object.name.clone(),
                            fingerprint,
                        });
                        minted.push(MintedSecret {
                            target: target.clone(),
                            object,
                            payload: request.payload,
                        });
                    }
                    Err(e) if self.policy == FailurePolicy::Continue => {
                        error!(
                            "Failed to create {}, {} will not be rotated: {}",
                            target.versioned,
                            target.kind.description(),
                            e
                        );
                        metrics::increment_rotation_errors(Stage::Mint.as_str());
                        outcomes.push(MintOutcome::Failed {
                            kind: target.kind,
                            name: target.versioned.to_string(),
                            error: e.to_string(),
                        });
                    }
                    Err(e) => return Err(RotationError::store(Stage::Mint, e)),
                }
            }

            Ok(MintReport {
                secrets: minted.into_iter().collect(),
                outcomes,
            })
        }
        .instrument(span)
        .await
    }
}

async fn read_source(target: &RotationTarget) -> Result<SecretPayload, RotationError> {
    tokio::fs::read(&target.source)
        .await
        .map(SecretPayload::new)
        .map_err(|source| RotationError::ReadSource {
            kind: target.kind,
            path: target.source.clone(),
            source,
        })
}
