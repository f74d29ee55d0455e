//! Repository reconciliation against the remote provider.
//!
//! A sync pulls the remote's current branches, commits, files, and
//! collaborators into the mirror store. The ordering discipline is what makes
//! interrupted syncs safe: commits are inserted oldest-first and a branch head
//! is moved only after every commit behind it is stored, so a crash mid-sync
//! leaves the mirror behind the remote, never inconsistent with it. Re-running
//! the sync converges because every store write is an idempotent upsert.
//!
//! Commit discovery is a bounded walk: the newest commits of each branch are
//! listed and walked until a SHA the store already holds (or the walk limit)
//! is reached. Enrichment (per-file content and version history) is
//! best-effort; its failures are logged and never fail the sync.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::provider::{
    Provider, ProviderError, RemoteBranch, RemoteCommitDetail, RetryConfig, retry::retry_transient,
};
use crate::languages::is_source_file;
use crate::store::{
    BranchUpdate, Collaborator, LastCommit, MirrorStore, NewCommit, NewFileChange, Repository,
    StoreError,
};
use crate::types::{ChangeType, Permission, RepoFullName, RepositoryId, SyncStatus};
use crate::versions::{FileSnapshot, VersionEngine};

/// Errors that fail a repository sync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("repository not mirrored: {0}")]
    NotMirrored(RepoFullName),

    #[error("unknown repository id: {0}")]
    UnknownRepository(RepositoryId),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one sync run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub branches_synced: usize,
    pub branches_deleted: usize,
    pub commits_added: usize,
    pub collaborators_synced: usize,
}

/// Tuning knobs for the sync engine.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// How many commits to list per branch when walking back to a known SHA.
    pub commit_walk_limit: usize,
    pub retry: RetryConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            commit_walk_limit: 100,
            retry: RetryConfig::DEFAULT,
        }
    }
}

/// Reconciles mirrored repositories with the remote provider.
pub struct SyncEngine<P> {
    store: Arc<MirrorStore>,
    provider: Arc<P>,
    versions: VersionEngine,
    options: SyncOptions,
}

impl<P: Provider> SyncEngine<P> {
    pub fn new(store: Arc<MirrorStore>, provider: Arc<P>, options: SyncOptions) -> Self {
        let versions = VersionEngine::new(store.clone());
        SyncEngine {
            store,
            provider,
            versions,
            options,
        }
    }

    pub fn store(&self) -> &Arc<MirrorStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Syncs the repository identified by full name. Webhook entry point.
    pub async fn sync_by_full_name(&self, full_name: &RepoFullName) -> Result<SyncReport, SyncError> {
        match self.store.repository_by_full_name(full_name) {
            Some(repo) => self.sync_repository(repo.id).await,
            None => Err(SyncError::NotMirrored(full_name.clone())),
        }
    }

    /// Runs a full sync for one repository.
    ///
    /// The repository row moves `Syncing` → `Completed` on success, or
    /// `Syncing` → `Failed` with the error recorded on it. The error is also
    /// returned so callers can decide whether to surface it.
    pub async fn sync_repository(&self, repository: RepositoryId) -> Result<SyncReport, SyncError> {
        let Some(repo) = self.store.repository(repository) else {
            return Err(SyncError::UnknownRepository(repository));
        };
        self.store.set_sync_status(repository, SyncStatus::Syncing);
        info!(repo = %repo.full_name, "sync started");

        match self.run(&repo).await {
            Ok(report) => {
                self.store.mark_sync_completed(repository, Utc::now());
                info!(
                    repo = %repo.full_name,
                    commits = report.commits_added,
                    branches = report.branches_synced,
                    "sync completed"
                );
                Ok(report)
            }
            Err(err) => {
                self.store.mark_sync_failed(repository, err.to_string());
                warn!(repo = %repo.full_name, error = %err, "sync failed");
                Err(err)
            }
        }
    }

    async fn run(&self, repo: &Repository) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        let remote_repo = retry_transient(&self.options.retry, "fetch repository", || {
            self.provider.fetch_repository(&repo.full_name)
        })
        .await?;
        let default_branch = remote_repo.default_branch;

        let remote_branches = retry_transient(&self.options.retry, "fetch branches", || {
            self.provider.fetch_branches(&repo.full_name)
        })
        .await?;

        // Branches gone from the remote are dropped first so their files
        // don't linger while the rest of the sync runs.
        for local in self.store.branches(repo.id) {
            if !remote_branches.iter().any(|b| b.name == local.name) {
                debug!(repo = %repo.full_name, branch = %local.name, "branch gone remotely, deleting");
                self.store.delete_branch(repo.id, &local.name);
                report.branches_deleted += 1;
            }
        }

        for branch in &remote_branches {
            report.commits_added += self
                .reconcile_branch(repo, branch, branch.name == default_branch)
                .await?;
            report.branches_synced += 1;
        }

        report.collaborators_synced = self.sync_collaborators(repo).await?;
        Ok(report)
    }

    /// Brings one branch up to date with its remote head.
    ///
    /// Returns the number of commits added. Skips entirely when the local
    /// branch row already matches the remote head.
    async fn reconcile_branch(
        &self,
        repo: &Repository,
        remote: &RemoteBranch,
        is_default: bool,
    ) -> Result<usize, SyncError> {
        if let Some(local) = self.store.branch(repo.id, &remote.name) {
            if local.head_sha == remote.head_sha
                && local.protected == remote.protected
                && local.is_default == is_default
            {
                debug!(branch = %remote.name, "branch already at remote head");
                return Ok(0);
            }
        }

        let summaries = retry_transient(&self.options.retry, "list commits", || {
            self.provider
                .fetch_recent_commits(&repo.full_name, &remote.name, self.options.commit_walk_limit)
        })
        .await?;
        if summaries.is_empty() {
            debug!(branch = %remote.name, "branch has no commits, skipping");
            return Ok(0);
        }

        // Walk newest-first until a commit the store already holds, then
        // insert the gap oldest-first so ancestors are always stored before
        // descendants.
        let mut missing: Vec<_> = Vec::new();
        for summary in summaries {
            if self.store.has_commit(repo.id, &summary.sha) {
                break;
            }
            missing.push(summary);
        }
        missing.reverse();

        let mut added = 0;
        for summary in &missing {
            let detail = retry_transient(&self.options.retry, "fetch commit", || {
                self.provider.fetch_commit(&repo.full_name, &summary.sha)
            })
            .await?;

            let changes: Vec<NewFileChange> = detail
                .files
                .iter()
                .map(|f| NewFileChange {
                    path: f.path.clone(),
                    change_type: ChangeType::parse_lenient(&f.status),
                    additions: f.additions,
                    deletions: f.deletions,
                    patch: f.patch.clone(),
                    previous_path: f.previous_path.clone(),
                })
                .collect();
            let (_, inserted) = self.store.insert_commit(
                repo.id,
                NewCommit {
                    sha: detail.summary.sha.clone(),
                    message: detail.summary.message.clone(),
                    author_name: detail.summary.author_name.clone(),
                    author_email: detail.summary.author_email.clone(),
                    committed_at: detail.summary.committed_at,
                    additions: detail.additions,
                    deletions: detail.deletions,
                    files_changed: detail.files.len() as u64,
                    branch: Some(remote.name.clone()),
                },
                changes,
            )?;

            if inserted {
                added += 1;
                self.store
                    .add_contributions(repo.id, &detail.summary.author_name, 1);
                self.record_snapshots(repo, &remote.name, &detail).await;
            }
        }

        // The head moves last, and only to a SHA that is durably stored.
        if self.store.has_commit(repo.id, &remote.head_sha) {
            let last_commit = self
                .store
                .commit_by_sha(repo.id, &remote.head_sha)
                .map(|c| LastCommit {
                    sha: c.sha,
                    message: c.message,
                    author: c.author_name,
                    committed_at: c.committed_at,
                });
            self.store.upsert_branch(
                repo.id,
                BranchUpdate {
                    name: remote.name.clone(),
                    head_sha: remote.head_sha.clone(),
                    protected: remote.protected,
                    is_default,
                    last_commit,
                },
            )?;
        } else {
            // The walk limit ran out before reaching a stored ancestor of the
            // head; the head itself was still in the listing, so this only
            // happens when the listing itself omitted it.
            warn!(
                branch = %remote.name,
                head = %remote.head_sha,
                "remote head not among fetched commits, leaving branch head unchanged"
            );
        }

        Ok(added)
    }

    /// Updates current-file rows and the version history for one new commit.
    ///
    /// Content is fetched at the commit's own SHA, not the branch tip, so a
    /// sync that closes a multi-commit gap records each commit's actual
    /// content. Purely additive enrichment: a content fetch failure skips
    /// that file and the sync carries on.
    async fn record_snapshots(&self, repo: &Repository, branch: &str, detail: &RemoteCommitDetail) {
        let mut snapshots = Vec::new();
        for file in &detail.files {
            if ChangeType::parse_lenient(&file.status) == ChangeType::Removed {
                continue;
            }
            if !is_source_file(&file.path) {
                continue;
            }
            match self
                .provider
                .fetch_file_content(&repo.full_name, detail.summary.sha.as_str(), &file.path)
                .await
            {
                Ok(Some(content)) => {
                    self.store.upsert_file(
                        repo.id,
                        branch,
                        &file.path,
                        Some(content.content.clone()),
                        content.size,
                        Some(detail.summary.sha.clone()),
                    );
                    snapshots.push(FileSnapshot {
                        path: file.path.clone(),
                        content: content.content,
                    });
                }
                Ok(None) => {
                    debug!(path = %file.path, "file absent at ref, skipping snapshot");
                }
                Err(err) => {
                    debug!(path = %file.path, error = %err, "content fetch failed, skipping snapshot");
                }
            }
        }
        self.versions.process_commit(
            repo.id,
            &detail.summary.sha,
            branch,
            &detail.summary.author_name,
            snapshots,
        );
    }

    /// Mirrors the remote collaborator list.
    ///
    /// Collaborators missing remotely are soft-deactivated; contribution
    /// counters and user links survive permission changes.
    async fn sync_collaborators(&self, repo: &Repository) -> Result<usize, SyncError> {
        let remote = retry_transient(&self.options.retry, "fetch collaborators", || {
            self.provider.fetch_collaborators(&repo.full_name)
        })
        .await?;
        let existing = self.store.collaborators(repo.id);

        for collaborator in &remote {
            let prior = existing
                .iter()
                .find(|e| e.username == collaborator.username);
            self.store.upsert_collaborator(Collaborator {
                repository: repo.id,
                username: collaborator.username.clone(),
                permission: Permission::parse_lenient(&collaborator.permission),
                contributions: prior.map_or(0, |p| p.contributions),
                user: prior.and_then(|p| p.user),
                active: true,
            });
        }
        for collaborator in &existing {
            if collaborator.active
                && !remote.iter().any(|c| c.username == collaborator.username)
            {
                self.store
                    .deactivate_collaborator(repo.id, &collaborator.username);
            }
        }
        Ok(remote.len())
    }
}
