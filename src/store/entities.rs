//! Mirror store row types.
//!
//! These are the relational entities of the point-in-time repository mirror:
//! branches, commits, file-changes, current files, collaborators, webhook
//! subscriptions, and the append-only code version history. Ownership is by
//! foreign key (row ids), never by embedded object graph, so cascade-delete
//! semantics stay straightforward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ChangeType, CommitId, FileId, HookId, Permission, RemoteId, RepoFullName, RepositoryId, Sha,
    SubscriptionStatus, SyncStatus, UserId, VersionId, VersionStatus,
};

/// One mirrored remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub remote_id: Option<RemoteId>,
    /// Unique across the store.
    pub full_name: RepoFullName,
    /// The internal owner who linked or created the repository.
    pub owner: UserId,
    pub private: bool,
    pub default_branch: String,
    pub sync_status: SyncStatus,
    /// Populated when `sync_status` is `Failed`.
    pub sync_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a repository row.
#[derive(Debug, Clone)]
pub struct NewRepository {
    pub remote_id: Option<RemoteId>,
    pub full_name: RepoFullName,
    pub owner: UserId,
    pub private: bool,
    pub default_branch: String,
}

/// A branch of a mirrored repository, unique per (repository, name).
///
/// Carries a denormalized summary of its most recent commit for fast listing;
/// the summary and the head SHA are replaced together on every upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub repository: RepositoryId,
    pub name: String,
    pub head_sha: Sha,
    pub protected: bool,
    pub is_default: bool,
    pub last_commit: Option<LastCommit>,
}

/// Denormalized "last commit" summary stored on a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCommit {
    pub sha: Sha,
    pub message: String,
    pub author: String,
    pub committed_at: Option<DateTime<Utc>>,
}

/// A commit, unique per (repository, sha). Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub repository: RepositoryId,
    pub sha: Sha,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub committed_at: Option<DateTime<Utc>>,
    /// Diff totals across all files in the commit.
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
    /// The branch the commit was first observed on, if known.
    pub branch: Option<String>,
}

/// Fields for creating a commit row; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewCommit {
    pub sha: Sha,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub committed_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
    pub branch: Option<String>,
}

/// One file path touched by one commit. Stored together with its commit,
/// never alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub repository: RepositoryId,
    pub commit: CommitId,
    pub path: String,
    pub change_type: ChangeType,
    pub additions: u64,
    pub deletions: u64,
    pub patch: Option<String>,
    /// Set for renames: the path before the rename.
    pub previous_path: Option<String>,
}

/// Fields for a file change; repository and commit ids are filled in by the
/// store when the owning commit is inserted.
#[derive(Debug, Clone)]
pub struct NewFileChange {
    pub path: String,
    pub change_type: ChangeType,
    pub additions: u64,
    pub deletions: u64,
    pub patch: Option<String>,
    pub previous_path: Option<String>,
}

/// Current state of one file on one branch, unique per
/// (repository, branch, path). Replaced wholesale on each sync; history lives
/// in [`CodeVersion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub repository: RepositoryId,
    pub branch: String,
    pub path: String,
    pub content: Option<String>,
    pub size: u64,
    pub last_commit_sha: Option<Sha>,
}

/// A repository collaborator, unique per (repository, username).
///
/// Removed collaborators are soft-deactivated, never deleted, to preserve
/// audit history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub repository: RepositoryId,
    pub username: String,
    pub permission: Permission,
    /// Contribution counter (commits observed for this author).
    pub contributions: u64,
    /// Internal user matched out-of-band, if any.
    pub user: Option<UserId>,
    pub active: bool,
}

/// Per-repository webhook subscription and delivery health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub repository: RepositoryId,
    pub repo_full_name: RepoFullName,
    pub remote_id: Option<RemoteId>,
    pub hook_id: Option<HookId>,
    pub status: SubscriptionStatus,
    /// Only ever increases on failed deliveries; reset solely by explicit
    /// re-registration.
    pub failure_count: u32,
    pub last_delivery: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// Failure count at or above which a subscription is considered
    /// unhealthy, independent of its status.
    pub const HEALTHY_FAILURE_LIMIT: u32 = 5;

    pub fn is_healthy(&self) -> bool {
        self.failure_count < Self::HEALTHY_FAILURE_LIMIT
    }
}

/// An immutable snapshot of one file's content at one commit, chained to its
/// predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVersion {
    pub id: VersionId,
    pub repository: RepositoryId,
    pub path: String,
    pub commit_sha: Sha,
    pub branch: String,
    pub content: String,
    pub author: String,
    pub status: VersionStatus,
    /// The immediately preceding version of this path, if any.
    pub parent: Option<VersionId>,
    pub created_at: DateTime<Utc>,
    pub stats: VersionStats,
}

/// Size and change statistics for one code version, relative to the previous
/// version of the same path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStats {
    pub line_count: u64,
    pub byte_count: u64,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub lines_modified: u64,
}

/// Fields for appending a version; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub repository: RepositoryId,
    pub path: String,
    pub commit_sha: Sha,
    pub branch: String,
    pub content: String,
    pub author: String,
    pub parent: Option<VersionId>,
    pub stats: VersionStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn subscription_health_threshold() {
        let mut sub = WebhookSubscription {
            repository: RepositoryId(1),
            repo_full_name: RepoFullName::new("org/repo"),
            remote_id: None,
            hook_id: None,
            status: SubscriptionStatus::Active,
            failure_count: 4,
            last_delivery: None,
            last_error: None,
            created_at: Utc::now(),
        };
        assert!(sub.is_healthy());

        sub.failure_count = 5;
        assert!(!sub.is_healthy());

        // Health is independent of status.
        sub.status = SubscriptionStatus::Failed;
        sub.failure_count = 0;
        assert!(sub.is_healthy());
    }
}
