//! # Secret Rotation
//!
//! Rotates certificate secrets for one domain and repoints every service
//! that mounts them. Three stages run strictly one after the other:
//!
//! 1. [`VersionMinter`] creates `{prefix}_{domain}_{stamp}` for every
//!    configured kind, inheriting labels from the current alias
//! 2. [`ServiceRebinder`] rewrites the secret list of every service that
//!    references a rotating kind, in one update per service
//! 3. [`RetentionSweeper`] deletes every superseded secret of the rotated
//!    kinds and recreates the `{prefix}_{domain}` alias with the new payload
//!
//! Deleting is only safe because stage 2 has already moved every service
//! off the old names.

mod labels;
mod minter;
mod plan;
mod rebinder;
mod report;
mod sweeper;

pub use labels::current_labels;
pub use minter::{MintReport, MintedSecret, MintedSecrets, VersionMinter};
pub use plan::{CertificateFiles, RotationPlan, RotationTarget};
pub use rebinder::{rebuild_references, ServiceRebinder};
pub use report::{
    MintOutcome, RebindReport, RotationReport, ServiceOutcome, SkipReason, SweepOutcome,
    SweepReport,
};
pub use sweeper::RetentionSweeper;

use crate::model::{NameError, SecretKind};
use crate::observability::metrics;
use crate::provider::{ProviderError, SecretStore, ServiceStore};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Pipeline stage, for errors and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Mint,
    Rebind,
    Sweep,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Mint, Stage::Rebind, Stage::Sweep];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Mint => "mint",
            Stage::Rebind => "rebind",
            Stage::Sweep => "sweep",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rotation run that had to stop
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("invalid secret name: {0}")]
    Name(#[from] NameError),
    #[error("failed to read {kind} file {path}: {source}")]
    ReadSource {
        kind: SecretKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} stage failed: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: ProviderError,
    },
}

impl RotationError {
    pub(crate) fn store(stage: Stage, source: ProviderError) -> Self {
        RotationError::Store { stage, source }
    }
}

/// Run all three stages for a plan
///
/// Under [`FailurePolicy::FailFast`](crate::config::FailurePolicy) the first
/// failure is returned and the cluster is left in whatever intermediate
/// state was reached. Under `Continue` failures are recorded in the report
/// instead; check [`RotationReport::is_success`].
pub async fn rotate(
    secrets: &dyn SecretStore,
    services: &dyn ServiceStore,
    plan: &RotationPlan,
) -> Result<RotationReport, RotationError> {
    let start = Instant::now();
    let mut report = RotationReport::new(plan.stamp.clone());

    if plan.is_empty() {
        info!("No secret kinds configured for {}, nothing to rotate", plan.domain);
        return Ok(report);
    }

    info!("Secret names will be versioned with: {}", plan.stamp);
    for target in plan.targets() {
        info!(
            "Secret name for {} will be {}",
            target.kind.description(),
            target.versioned
        );
    }

    let result = run_stages(secrets, services, plan, &mut report).await;
    metrics::observe_rotation_duration(start.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            info!(
                "Rotation for {} finished: {} minted, {} services updated, {} secrets removed, {} failures",
                plan.domain,
                report.minted_count(),
                report.services.updated_count(),
                report.sweep.deleted_count(),
                report.failure_count()
            );
            Ok(report)
        }
        Err(e) => {
            if let RotationError::Store { stage, .. } = &e {
                metrics::increment_rotation_errors(stage.as_str());
            } else {
                metrics::increment_rotation_errors(Stage::Mint.as_str());
            }
            Err(e)
        }
    }
}

async fn run_stages(
    secrets: &dyn SecretStore,
    services: &dyn ServiceStore,
    plan: &RotationPlan,
    report: &mut RotationReport,
) -> Result<(), RotationError> {
    let MintReport {
        secrets: minted,
        outcomes,
    } = VersionMinter::new(secrets, plan.policy).mint(plan).await?;
    report.minted = outcomes;

    if minted.is_empty() {
        info!("No secrets were minted, leaving services and old secrets untouched");
        return Ok(());
    }

    let rebind = ServiceRebinder::new(services, plan.policy)
        .rebind(&minted)
        .await?;
    let protected = rebind.protected_names();
    report.services = rebind;

    report.sweep = RetentionSweeper::new(secrets, plan.policy)
        .sweep(&minted, &protected)
        .await?;

    Ok(())
}
