//! # Rotation Metrics
//!
//! Metrics for the mint, rebind and sweep stages.
//!
//! Rotations run inside the short-lived `rotate-secrets` process, so the
//! counters are also exchanged as a [`RotationSnapshot`]: the hook takes one
//! on exit and the daemon adds it to its own counters.

use crate::controller::rotation::Stage;
use crate::model::SecretKind;
use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SECRETS_MINTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "swarm_secret_rotator_secrets_minted_total",
            "Total number of versioned secrets created, by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create SECRETS_MINTED_TOTAL metric - this should never happen")
});

static SERVICES_REBOUND_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "swarm_secret_rotator_services_rebound_total",
        "Total number of services updated to reference new secrets",
    )
    .expect("Failed to create SERVICES_REBOUND_TOTAL metric - this should never happen")
});

static SERVICES_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "swarm_secret_rotator_services_skipped_total",
        "Total number of services skipped because they mount no secrets",
    )
    .expect("Failed to create SERVICES_SKIPPED_TOTAL metric - this should never happen")
});

static SECRETS_DELETED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "swarm_secret_rotator_secrets_deleted_total",
            "Total number of superseded secrets deleted, by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create SECRETS_DELETED_TOTAL metric - this should never happen")
});

static ALIASES_REFRESHED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "swarm_secret_rotator_aliases_refreshed_total",
            "Total number of unversioned secrets recreated, by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create ALIASES_REFRESHED_TOTAL metric - this should never happen")
});

static ROTATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "swarm_secret_rotator_rotation_errors_total",
            "Total number of rotation failures, by stage",
        ),
        &["stage"],
    )
    .expect("Failed to create ROTATION_ERRORS_TOTAL metric - this should never happen")
});

static ROTATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "swarm_secret_rotator_rotation_duration_seconds",
            "Duration of rotation runs in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create ROTATION_DURATION metric - this should never happen")
});

/// Register rotation metrics with the registry
pub(crate) fn register_rotation_metrics() -> Result<()> {
    REGISTRY.register(Box::new(SECRETS_MINTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SERVICES_REBOUND_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SERVICES_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ALIASES_REFRESHED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROTATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROTATION_DURATION.clone()))?;
    Ok(())
}

pub fn record_secret_minted(kind: &str) {
    SECRETS_MINTED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_service_rebound() {
    SERVICES_REBOUND_TOTAL.inc();
}

pub fn record_service_skipped() {
    SERVICES_SKIPPED_TOTAL.inc();
}

pub fn record_secret_deleted(kind: &str) {
    SECRETS_DELETED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_alias_refreshed(kind: &str) {
    ALIASES_REFRESHED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_rotation_errors(stage: &str) {
    ROTATION_ERRORS_TOTAL.with_label_values(&[stage]).inc();
}

pub fn observe_rotation_duration(duration: f64) {
    ROTATION_DURATION.observe(duration);
}

/// Rotation counter values of one process
///
/// Counters are keyed by `kind` or `stage` label value; zero entries are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSnapshot {
    pub secrets_minted: BTreeMap<String, u64>,
    pub services_rebound: u64,
    pub services_skipped: u64,
    pub secrets_deleted: BTreeMap<String, u64>,
    pub aliases_refreshed: BTreeMap<String, u64>,
    pub rotation_errors: BTreeMap<String, u64>,
    pub duration_seconds_sum: f64,
    pub duration_count: u64,
}

impl RotationSnapshot {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn kind_labels() -> impl Iterator<Item = &'static str> {
    SecretKind::ALL.into_iter().map(SecretKind::as_str)
}

fn stage_labels() -> impl Iterator<Item = &'static str> {
    Stage::ALL.into_iter().map(Stage::as_str)
}

fn label_values(
    counter: &IntCounterVec,
    labels: impl Iterator<Item = &'static str>,
) -> BTreeMap<String, u64> {
    labels
        .filter_map(|label| {
            let value = counter.with_label_values(&[label]).get();
            (value > 0).then(|| (label.to_string(), value))
        })
        .collect()
}

fn add_label_values(
    counter: &IntCounterVec,
    labels: impl Iterator<Item = &'static str>,
    values: &BTreeMap<String, u64>,
) {
    // Only known label values, so a stray file cannot create new series
    for label in labels {
        if let Some(value) = values.get(label) {
            counter.with_label_values(&[label]).inc_by(*value);
        }
    }
}

/// Current rotation counter values of this process
pub fn rotation_snapshot() -> RotationSnapshot {
    RotationSnapshot {
        secrets_minted: label_values(&SECRETS_MINTED_TOTAL, kind_labels()),
        services_rebound: SERVICES_REBOUND_TOTAL.get(),
        services_skipped: SERVICES_SKIPPED_TOTAL.get(),
        secrets_deleted: label_values(&SECRETS_DELETED_TOTAL, kind_labels()),
        aliases_refreshed: label_values(&ALIASES_REFRESHED_TOTAL, kind_labels()),
        rotation_errors: label_values(&ROTATION_ERRORS_TOTAL, stage_labels()),
        duration_seconds_sum: ROTATION_DURATION.get_sample_sum(),
        duration_count: ROTATION_DURATION.get_sample_count(),
    }
}

/// Add another process's rotation counters to this one's
///
/// Durations are observed at their mean, which is exact for the usual
/// snapshot of a single run.
pub fn record_rotation_snapshot(snapshot: &RotationSnapshot) {
    add_label_values(&SECRETS_MINTED_TOTAL, kind_labels(), &snapshot.secrets_minted);
    SERVICES_REBOUND_TOTAL.inc_by(snapshot.services_rebound);
    SERVICES_SKIPPED_TOTAL.inc_by(snapshot.services_skipped);
    add_label_values(&SECRETS_DELETED_TOTAL, kind_labels(), &snapshot.secrets_deleted);
    add_label_values(&ALIASES_REFRESHED_TOTAL, kind_labels(), &snapshot.aliases_refreshed);
    add_label_values(&ROTATION_ERRORS_TOTAL, stage_labels(), &snapshot.rotation_errors);

    if snapshot.duration_count > 0 {
        let runs = f64::from(u32::try_from(snapshot.duration_count).unwrap_or(u32::MAX));
        let mean = snapshot.duration_seconds_sum / runs;
        for _ in 0..snapshot.duration_count {
            ROTATION_DURATION.observe(mean);
        }
    }
}
