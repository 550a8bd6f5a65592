//! # Retention Sweeper
//!
//! Runs after every service has been rebound. Keeps exactly the newest
//! snapshot of each rotated kind, then recreates the unversioned alias with
//! the same payload and labels so new deployments resolve to current
//! material.

use super::minter::MintedSecrets;
use super::report::{SweepOutcome, SweepReport};
use super::{RotationError, Stage};
use crate::config::FailurePolicy;
use crate::model::{NewSecret, SecretKind};
use crate::observability::metrics;
use crate::provider::SecretStore;
use std::collections::BTreeSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

#[derive(Debug)]
pub struct RetentionSweeper<'a> {
    store: &'a dyn SecretStore,
    policy: FailurePolicy,
}

impl<'a> RetentionSweeper<'a> {
    pub fn new(store: &'a dyn SecretStore, policy: FailurePolicy) -> Self {
        Self { store, policy }
    }

    /// Delete superseded secrets, then refresh the aliases
    ///
    /// Names in `protected` are still mounted by services that could not be
    /// rebound and are never deleted. A kind whose old alias survives the
    /// delete pass keeps it as is.
    pub async fn sweep(
        &self,
        minted: &MintedSecrets,
        protected: &BTreeSet<String>,
    ) -> Result<SweepReport, RotationError> {
        let span = info_span!("rotation.sweep", kinds = minted.len(), protected = protected.len());

        async move {
            let mut report = SweepReport::default();
            let blocked = self.delete_superseded(minted, protected, &mut report).await?;
            self.refresh_aliases(minted, &blocked, &mut report).await?;
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Delete pass, returning the kinds whose alias could not be removed
    async fn delete_superseded(
        &self,
        minted: &MintedSecrets,
        protected: &BTreeSet<String>,
        report: &mut SweepReport,
    ) -> Result<BTreeSet<SecretKind>, RotationError> {
        let existing = self
            .store
            .list_secrets()
            .await
            .map_err(|e| RotationError::store(Stage::Sweep, e))?;

        let mut blocked = BTreeSet::new();
        for secret in existing {
            let Some(newest) = minted.classify(&secret.name) else {
                continue;
            };
            if newest.target.versioned == secret.name.as_str() {
                continue;
            }
            let kind = newest.kind();
            let is_alias = newest.target.alias == secret.name.as_str();

            if protected.contains(&secret.name) {
                warn!(
                    "Keeping {} because a service that could not be updated still uses it",
                    secret.name
                );
                if is_alias {
                    blocked.insert(kind);
                }
                report.outcomes.push(SweepOutcome::Retained {
                    kind,
                    name: secret.name,
                });
                continue;
            }

            info!("Removing {}", secret.name);
            match self.store.delete_secret(&secret).await {
                Ok(()) => {
                    metrics::record_secret_deleted(kind.as_str());
                    report.outcomes.push(SweepOutcome::Deleted {
                        kind,
                        name: secret.name,
                    });
                }
                Err(e) if self.policy == FailurePolicy::Continue => {
                    error!("Failed to remove {}: {}", secret.name, e);
                    metrics::increment_rotation_errors(Stage::Sweep.as_str());
                    if is_alias {
                        blocked.insert(kind);
                    }
                    report.outcomes.push(SweepOutcome::DeleteFailed {
                        kind,
                        name: secret.name,
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(RotationError::store(Stage::Sweep, e)),
            }
        }
        Ok(blocked)
    }

    async fn refresh_aliases(
        &self,
        minted: &MintedSecrets,
        blocked: &BTreeSet<SecretKind>,
        report: &mut SweepReport,
    ) -> Result<(), RotationError> {
        info!("Recreating unversioned secrets");
        for newest in minted.iter() {
            let kind = newest.kind();
            let alias = &newest.target.alias;
            if blocked.contains(&kind) {
                warn!("Leaving {} unchanged, the old secret is still in place", alias);
                report.outcomes.push(SweepOutcome::AliasKept {
                    kind,
                    name: alias.to_string(),
                });
                continue;
            }

            let request = NewSecret {
                name: alias.clone(),
                payload: newest.payload.clone(),
                labels: newest.object.labels.clone(),
            };
            info!(
                "Creating new secret {} with labels {:?}",
                alias, request.labels
            );
            match self.store.create_secret(&request).await {
                Ok(object) => {
                    debug!("Created {} as {}", object.name, object.id);
                    metrics::record_alias_refreshed(kind.as_str());
                    report.outcomes.push(SweepOutcome::AliasRefreshed {
                        kind,
                        name: object.name,
                    });
                }
                Err(e) if self.policy == FailurePolicy::Continue => {
                    error!("Failed to recreate {}: {}", alias, e);
                    metrics::increment_rotation_errors(Stage::Sweep.as_str());
                    report.outcomes.push(SweepOutcome::AliasFailed {
                        kind,
                        name: alias.to_string(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(RotationError::store(Stage::Sweep, e)),
            }
        }
        Ok(())
    }
}
