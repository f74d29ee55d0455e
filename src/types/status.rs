//! Status enums shared across the mirror store and HTTP surface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Synchronization state of a mirrored repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never synced.
    Pending,
    /// A sync is currently in flight.
    Syncing,
    /// The last sync finished successfully.
    Completed,
    /// The last sync failed; see `Repository::sync_error`.
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of a webhook subscription.
///
/// Unsubscription is an explicit transition to `Inactive`; subscription rows
/// are never silently deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription requested but not yet confirmed with the provider.
    Pending,
    /// Receiving deliveries.
    Active,
    /// Explicitly unsubscribed.
    Inactive,
    /// Too many consecutive delivery failures.
    Failed,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state of a code version snapshot.
///
/// Versions are never deleted; "deletion" is a transition to `Archived` or
/// `Deleted` so history stays queryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Active,
    Archived,
    Deleted,
}

/// The kind of change a commit applied to one file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl ChangeType {
    /// Parses the provider's status string ("added", "modified", ...).
    ///
    /// Unknown strings map to `Modified`, the least surprising default for a
    /// file the provider reports as touched.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "added" => ChangeType::Added,
            "removed" => ChangeType::Removed,
            "renamed" => ChangeType::Renamed,
            _ => ChangeType::Modified,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Removed => "removed",
            ChangeType::Renamed => "renamed",
        };
        write!(f, "{s}")
    }
}

/// A collaborator's permission level on a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Triage,
    Write,
    Maintain,
    Admin,
}

impl Permission {
    /// Parses the provider's permission string, defaulting to `Read`.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "admin" => Permission::Admin,
            "maintain" => Permission::Maintain,
            "write" | "push" => Permission::Write,
            "triage" => Permission::Triage,
            _ => Permission::Read,
        }
    }
}
