//! # Runtime Module
//!
//! Process setup shared by both binaries, and the renewal daemon loop.

pub mod daemon;
pub mod initialization;

pub use daemon::*;
pub use initialization::*;
