//! # Observability
//!
//! Prometheus metrics for rotation runs and the renewal daemon.

pub mod metrics;
