//! # Renewal Metrics
//!
//! Metrics for the renewal daemon loop.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{IntCounter, IntGauge};
use std::sync::LazyLock;

static RENEWAL_RUNS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "swarm_secret_rotator_renewal_runs_total",
        "Total number of renewal command runs",
    )
    .expect("Failed to create RENEWAL_RUNS_TOTAL metric - this should never happen")
});

static RENEWAL_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "swarm_secret_rotator_renewal_failures_total",
        "Total number of renewal command runs that failed or could not be started",
    )
    .expect("Failed to create RENEWAL_FAILURES_TOTAL metric - this should never happen")
});

static LAST_RENEWAL_TIMESTAMP: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "swarm_secret_rotator_last_renewal_timestamp_seconds",
        "Unix time at which the last renewal command run finished",
    )
    .expect("Failed to create LAST_RENEWAL_TIMESTAMP metric - this should never happen")
});

/// Register renewal metrics with the registry
pub(crate) fn register_renewal_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RENEWAL_RUNS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RENEWAL_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LAST_RENEWAL_TIMESTAMP.clone()))?;
    Ok(())
}

pub fn increment_renewal_runs() {
    RENEWAL_RUNS_TOTAL.inc();
}

pub fn increment_renewal_failures() {
    RENEWAL_FAILURES_TOTAL.inc();
}

pub fn set_last_renewal_timestamp(unix_seconds: i64) {
    LAST_RENEWAL_TIMESTAMP.set(unix_seconds);
}
