//! # Metrics
//!
//! Metric statics live in their own modules and are registered once at
//! startup. Recording into a metric that was never registered is harmless;
//! it just never shows up on `/metrics`.

mod handoff;
mod registry;
mod renewal_metrics;
mod rotation_metrics;

pub use handoff::{collect_rotation_snapshots, write_rotation_snapshot};
pub use renewal_metrics::*;
pub use rotation_metrics::*;

use anyhow::{Context, Result};
use prometheus::{Encoder, TextEncoder};
use registry::REGISTRY;

/// Register every metric with the registry
///
/// Call once per process; a second call fails with a duplicate registration.
pub fn register_metrics() -> Result<()> {
    rotation_metrics::register_rotation_metrics()?;
    renewal_metrics::register_renewal_metrics()?;
    Ok(())
}

/// Registered metrics in the Prometheus text exposition format
pub fn gather() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}
