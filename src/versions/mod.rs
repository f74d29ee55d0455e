//! Append-only per-file code version history.

pub mod diff;
pub mod engine;

pub use diff::line_stats;
pub use engine::{FileSnapshot, VersionEngine};
