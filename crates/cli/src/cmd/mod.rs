//! CLI command implementations

pub mod diff;
pub mod tree;
pub mod watch;
