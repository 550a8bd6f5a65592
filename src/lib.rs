//! # Swarm Secret Rotator
//!
//! Rotates TLS certificate secrets in Docker Swarm.
//!
//! Docker secrets are immutable, so a renewed certificate is stored as a new
//! versioned secret (`{prefix}_{domain}_{stamp}`), every service mounting the
//! old material is repointed to it, and superseded secrets are removed. The
//! unversioned `{prefix}_{domain}` alias is then recreated with the newest
//! payload so stacks deployed later still resolve to current material.
//!
//! Two binaries ship with the library:
//!
//! - `swarm-secret-rotator` runs the ACME client (dehydrated) on an interval
//! - `rotate-secrets` is the deploy hook the ACME client calls with the
//!   renewed files, and runs [`controller::rotation::rotate`]

pub mod config;
pub mod constants;
pub mod controller;
pub mod model;
pub mod observability;
pub mod provider;
pub mod runtime;
