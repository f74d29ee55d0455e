//! Typed webhook event representations.
//!
//! Each variant corresponds to one provider event type the service reacts to,
//! carrying only the fields the handlers need: repository identity, the
//! branch or ref involved, the acting user, and (for pushes) the commit list
//! with per-commit path sets. Event types outside this set are dropped by the
//! parser, not represented here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{RemoteId, RepoFullName, Sha};

/// A parsed webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GitHubEvent {
    /// Commits pushed to a ref.
    Push(PushEvent),
    /// Pull request opened, closed, merged, etc.
    PullRequest(PullRequestEvent),
    /// Issue opened, closed, etc.
    Issues(IssuesEvent),
    /// Branch or tag created.
    Create(RefEvent),
    /// Branch or tag deleted.
    Delete(RefEvent),
    /// Release published or edited.
    Release(ReleaseEvent),
    /// Repository forked.
    Fork(ForkEvent),
    /// Repository starred.
    Watch(WatchEvent),
}

impl GitHubEvent {
    /// Returns the repository this event belongs to.
    pub fn repo(&self) -> &RepoFullName {
        match self {
            GitHubEvent::Push(e) => &e.repo,
            GitHubEvent::PullRequest(e) => &e.repo,
            GitHubEvent::Issues(e) => &e.repo,
            GitHubEvent::Create(e) | GitHubEvent::Delete(e) => &e.repo,
            GitHubEvent::Release(e) => &e.repo,
            GitHubEvent::Fork(e) => &e.repo,
            GitHubEvent::Watch(e) => &e.repo,
        }
    }

    /// Returns the provider's numeric repository id, when the payload had one.
    pub fn remote_id(&self) -> Option<RemoteId> {
        match self {
            GitHubEvent::Push(e) => e.repo_remote_id,
            GitHubEvent::PullRequest(e) => e.repo_remote_id,
            GitHubEvent::Issues(e) => e.repo_remote_id,
            GitHubEvent::Create(e) | GitHubEvent::Delete(e) => e.repo_remote_id,
            GitHubEvent::Release(e) => e.repo_remote_id,
            GitHubEvent::Fork(e) => e.repo_remote_id,
            GitHubEvent::Watch(e) => e.repo_remote_id,
        }
    }

    /// Returns the user whose action produced the event.
    pub fn actor(&self) -> &str {
        match self {
            GitHubEvent::Push(e) => &e.pusher,
            GitHubEvent::PullRequest(e) => &e.actor,
            GitHubEvent::Issues(e) => &e.actor,
            GitHubEvent::Create(e) | GitHubEvent::Delete(e) => &e.actor,
            GitHubEvent::Release(e) => &e.actor,
            GitHubEvent::Fork(e) => &e.actor,
            GitHubEvent::Watch(e) => &e.actor,
        }
    }

    /// The event-type tag this event was parsed from.
    pub fn event_name(&self) -> &'static str {
        match self {
            GitHubEvent::Push(_) => "push",
            GitHubEvent::PullRequest(_) => "pull_request",
            GitHubEvent::Issues(_) => "issues",
            GitHubEvent::Create(_) => "create",
            GitHubEvent::Delete(_) => "delete",
            GitHubEvent::Release(_) => "release",
            GitHubEvent::Fork(_) => "fork",
            GitHubEvent::Watch(_) => "watch",
        }
    }
}

/// A push to a ref, with the commit list the provider included inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub repo: RepoFullName,
    pub repo_remote_id: Option<RemoteId>,

    /// The full ref that was pushed (e.g., `refs/heads/main`).
    pub ref_name: String,

    /// Head SHA before the push.
    pub before: Sha,

    /// Head SHA after the push.
    pub after: Sha,

    /// The pushing user's login.
    pub pusher: String,

    /// Commits in the push, oldest first, as the provider delivered them.
    pub commits: Vec<PushCommit>,
}

impl PushEvent {
    /// Returns the branch name when the pushed ref is a branch.
    pub fn branch(&self) -> Option<&str> {
        self.ref_name.strip_prefix("refs/heads/")
    }
}

/// One commit inside a push payload.
///
/// The inline payload carries path lists but no diffs; file-change detail is
/// fetched from the provider during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCommit {
    pub sha: Sha,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

/// A pull request lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub repo: RepoFullName,
    pub repo_remote_id: Option<RemoteId>,
    pub action: String,
    pub number: u64,
    pub title: String,
    pub base_branch: String,
    pub merged: bool,
    pub actor: String,
}

/// An issue lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuesEvent {
    pub repo: RepoFullName,
    pub repo_remote_id: Option<RemoteId>,
    pub action: String,
    pub number: u64,
    pub title: String,
    pub actor: String,
}

/// A branch or tag created/deleted event (`create` and `delete` share a shape).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefEvent {
    pub repo: RepoFullName,
    pub repo_remote_id: Option<RemoteId>,
    /// "branch" or "tag".
    pub ref_type: String,
    /// The bare ref name (no `refs/heads/` prefix in these payloads).
    pub ref_name: String,
    pub actor: String,
}

/// A release published/edited event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEvent {
    pub repo: RepoFullName,
    pub repo_remote_id: Option<RemoteId>,
    pub action: String,
    pub tag: String,
    pub name: Option<String>,
    pub actor: String,
}

/// A fork event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEvent {
    pub repo: RepoFullName,
    pub repo_remote_id: Option<RemoteId>,
    /// Full name of the newly created fork.
    pub fork_full_name: RepoFullName,
    pub actor: String,
}

/// A watch (star) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub repo: RepoFullName,
    pub repo_remote_id: Option<RemoteId>,
    pub actor: String,
}
