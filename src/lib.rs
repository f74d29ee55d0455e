//! repo-mirror - GitHub event ingestion and repository mirroring for a
//! university project-management platform.
//!
//! The service keeps a point-in-time relational mirror of subscribed GitHub
//! repositories: webhook deliveries are verified, tracked, and routed; the
//! sync engine reconciles the mirror against the GitHub API; and an
//! append-only version history records how each source file evolves commit
//! by commit.

pub mod aggregate;
pub mod config;
pub mod languages;
pub mod notify;
pub mod provider;
pub mod server;
pub mod store;
pub mod sync;
pub mod tracker;
pub mod types;
pub mod versions;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
