//! The remote source-control provider boundary.
//!
//! [`Provider`] is the trait seam between the sync engine and the outside
//! world. The production implementation ([`github::GitHubProvider`]) talks to
//! the GitHub REST API; tests substitute a mock. All methods return
//! `impl Future + Send` so implementations stay free of boxing while the
//! engine remains generic.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{HookId, RemoteId, RepoFullName, Sha};

pub mod github;
pub mod retry;

pub use github::GitHubProvider;
pub use retry::RetryConfig;

/// Errors from the remote provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The call exceeded the configured deadline.
    #[error("remote call timed out")]
    Timeout,

    /// The requested entity does not exist remotely.
    #[error("remote entity not found: {0}")]
    NotFound(String),

    /// The provider is throttling us.
    #[error("rate limited by provider")]
    RateLimited,

    /// The provider returned an API-level error.
    #[error("provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (connection, TLS, deserialization).
    #[error("provider transport error: {0}")]
    Http(String),
}

impl ProviderError {
    /// Whether retrying the same call may succeed.
    ///
    /// Not-found and 4xx API errors are permanent; timeouts, throttling,
    /// transport failures, and 5xx responses are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout | ProviderError::RateLimited | ProviderError::Http(_) => true,
            ProviderError::NotFound(_) => false,
            ProviderError::Api { status, .. } => *status >= 500,
        }
    }
}

/// A repository as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub remote_id: RemoteId,
    pub full_name: RepoFullName,
    pub private: bool,
    pub default_branch: String,
}

/// A branch head as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBranch {
    pub name: String,
    pub head_sha: Sha,
    pub protected: bool,
}

/// A commit from a listing endpoint (no per-file detail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommitSummary {
    pub sha: Sha,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub committed_at: Option<DateTime<Utc>>,
}

/// Full commit detail including its file changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommitDetail {
    pub summary: RemoteCommitSummary,
    pub additions: u64,
    pub deletions: u64,
    pub files: Vec<RemoteFileChange>,
}

/// One changed file in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileChange {
    pub path: String,
    /// Provider status string: "added", "modified", "removed", "renamed".
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub patch: Option<String>,
    pub previous_path: Option<String>,
}

/// The content of one file at one ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileContent {
    pub content: String,
    pub size: u64,
}

/// A repository collaborator as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCollaborator {
    pub username: String,
    /// Provider permission string: "admin", "push", "pull", ...
    pub permission: String,
}

/// The remote source-control provider.
pub trait Provider: Send + Sync {
    fn fetch_repository(
        &self,
        repo: &RepoFullName,
    ) -> impl Future<Output = Result<RemoteRepository, ProviderError>> + Send;

    fn fetch_branches(
        &self,
        repo: &RepoFullName,
    ) -> impl Future<Output = Result<Vec<RemoteBranch>, ProviderError>> + Send;

    /// Recent commits on a branch, newest first, at most `limit`.
    fn fetch_recent_commits(
        &self,
        repo: &RepoFullName,
        branch: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<RemoteCommitSummary>, ProviderError>> + Send;

    fn fetch_commit(
        &self,
        repo: &RepoFullName,
        sha: &Sha,
    ) -> impl Future<Output = Result<RemoteCommitDetail, ProviderError>> + Send;

    /// Content of one file at one ref (branch name or commit SHA); `Ok(None)`
    /// when the path does not exist there.
    fn fetch_file_content(
        &self,
        repo: &RepoFullName,
        reference: &str,
        path: &str,
    ) -> impl Future<Output = Result<Option<RemoteFileContent>, ProviderError>> + Send;

    fn fetch_collaborators(
        &self,
        repo: &RepoFullName,
    ) -> impl Future<Output = Result<Vec<RemoteCollaborator>, ProviderError>> + Send;

    fn list_user_repositories(
        &self,
        owner_login: &str,
    ) -> impl Future<Output = Result<Vec<RemoteRepository>, ProviderError>> + Send;

    /// Registers a webhook for the repository and returns the hook id.
    fn register_webhook(
        &self,
        repo: &RepoFullName,
        callback_url: &str,
    ) -> impl Future<Output = Result<HookId, ProviderError>> + Send;

    fn remove_webhook(
        &self,
        repo: &RepoFullName,
        hook: HookId,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Http("reset".into()).is_transient());
        assert!(
            ProviderError::Api {
                status: 502,
                message: "bad gateway".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::NotFound("org/repo".into()).is_transient());
        assert!(
            !ProviderError::Api {
                status: 422,
                message: "validation".into()
            }
            .is_transient()
        );
    }
}
