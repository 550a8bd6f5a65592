//! # Metrics Registry
//!
//! The process-wide Prometheus registry served on `/metrics`.

use prometheus::Registry;
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);
