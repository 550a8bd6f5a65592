//! # Controller
//!
//! The rotation pipeline and the daemon's HTTP server.

pub mod rotation;
pub mod server;
