//! Mirror synchronization: per-repository reconciliation and background bulk
//! runs.

pub mod bulk;
pub mod engine;

pub use bulk::{BulkOptions, BulkResync, BulkState, BulkSummary};
pub use engine::{SyncEngine, SyncError, SyncOptions, SyncReport};
