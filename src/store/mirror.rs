//! The mirror store.
//!
//! `MirrorStore` is the only shared mutable resource in the service. It holds
//! the relational mirror in memory, with every uniqueness rule of the data
//! model expressed as a map key: (repository, sha) for commits, (repository,
//! name) for branches, (repository, branch, path) for files, (repository,
//! username) for collaborators. An upsert on one of those keys is therefore
//! idempotent by construction (applying the same input twice leaves the same
//! rows), which is what lets webhook-triggered and bulk syncs race without
//! external locking.
//!
//! Two write rules carry the consistency guarantees:
//!
//! - A commit and its file-changes are stored together under one write lock
//!   acquisition, so no file-change ever exists without its commit.
//! - A branch head may only be set to a SHA that already has a commit row
//!   ([`StoreError::UnknownHeadCommit`] otherwise). Callers insert commits
//!   first and move the head last.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{
    CommitId, FileId, HookId, RemoteId, RepoFullName, RepositoryId, Sha, SubscriptionStatus,
    SyncStatus, VersionId, VersionStatus,
};

use super::entities::{
    Branch, CodeVersion, Collaborator, Commit, File, FileChange, NewCommit, NewFileChange,
    NewRepository, NewVersion, Repository, WebhookSubscription,
};

/// Errors surfaced by mirror store mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A repository with this full name already exists.
    #[error("repository already mirrored: {0}")]
    DuplicateRepository(RepoFullName),

    /// The referenced repository row does not exist.
    #[error("unknown repository: {0}")]
    UnknownRepository(RepositoryId),

    /// Attempt to point a branch head at a SHA with no commit row.
    #[error("branch {branch} head {sha} has no stored commit")]
    UnknownHeadCommit { branch: String, sha: Sha },
}

/// Fields replaced wholesale when a branch is upserted.
#[derive(Debug, Clone)]
pub struct BranchUpdate {
    pub name: String,
    pub head_sha: Sha,
    pub protected: bool,
    pub is_default: bool,
    pub last_commit: Option<super::entities::LastCommit>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,

    repositories: HashMap<RepositoryId, Repository>,
    repo_by_full_name: HashMap<RepoFullName, RepositoryId>,

    branches: HashMap<(RepositoryId, String), Branch>,

    commits: HashMap<CommitId, Commit>,
    commit_by_sha: HashMap<(RepositoryId, Sha), CommitId>,
    file_changes: HashMap<CommitId, Vec<FileChange>>,

    files: HashMap<FileId, File>,
    file_by_key: HashMap<(RepositoryId, String, String), FileId>,

    collaborators: HashMap<(RepositoryId, String), Collaborator>,

    subscriptions: HashMap<RepositoryId, WebhookSubscription>,

    versions: HashMap<VersionId, CodeVersion>,
    versions_by_path: HashMap<(RepositoryId, String), Vec<VersionId>>,
    version_commits: HashMap<(RepositoryId, Sha), Vec<VersionId>>,
}

impl Inner {
    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory relational mirror of remote repositories.
///
/// All methods take `&self`; interior mutability is a single `RwLock` over
/// the row maps. Reads return owned clones so no lock is held across await
/// points in callers.
#[derive(Default)]
pub struct MirrorStore {
    inner: RwLock<Inner>,
}

impl MirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        // Lock poisoning only happens if a writer panicked; store mutations
        // don't panic, so propagating the poison as a panic here is fine.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    // ─── repositories ───

    /// Creates a repository row. Full names are unique.
    pub fn create_repository(&self, new: NewRepository) -> Result<RepositoryId, StoreError> {
        let mut inner = self.write();
        if inner.repo_by_full_name.contains_key(&new.full_name) {
            return Err(StoreError::DuplicateRepository(new.full_name));
        }
        let id = RepositoryId(inner.fresh_id());
        let row = Repository {
            id,
            remote_id: new.remote_id,
            full_name: new.full_name.clone(),
            owner: new.owner,
            private: new.private,
            default_branch: new.default_branch,
            sync_status: SyncStatus::Pending,
            sync_error: None,
            last_synced_at: None,
            created_at: Utc::now(),
        };
        inner.repo_by_full_name.insert(new.full_name, id);
        inner.repositories.insert(id, row);
        Ok(id)
    }

    pub fn repository(&self, id: RepositoryId) -> Option<Repository> {
        self.read().repositories.get(&id).cloned()
    }

    pub fn repository_by_full_name(&self, full_name: &RepoFullName) -> Option<Repository> {
        let inner = self.read();
        let id = inner.repo_by_full_name.get(full_name)?;
        inner.repositories.get(id).cloned()
    }

    pub fn repositories(&self) -> Vec<Repository> {
        let mut repos: Vec<_> = self.read().repositories.values().cloned().collect();
        repos.sort_by_key(|r| r.id);
        repos
    }

    pub fn set_sync_status(&self, id: RepositoryId, status: SyncStatus) -> bool {
        let mut inner = self.write();
        match inner.repositories.get_mut(&id) {
            Some(repo) => {
                repo.sync_status = status;
                true
            }
            None => false,
        }
    }

    pub fn mark_sync_completed(&self, id: RepositoryId, at: DateTime<Utc>) -> bool {
        let mut inner = self.write();
        match inner.repositories.get_mut(&id) {
            Some(repo) => {
                repo.sync_status = SyncStatus::Completed;
                repo.sync_error = None;
                repo.last_synced_at = Some(at);
                true
            }
            None => false,
        }
    }

    pub fn mark_sync_failed(&self, id: RepositoryId, error: impl Into<String>) -> bool {
        let mut inner = self.write();
        match inner.repositories.get_mut(&id) {
            Some(repo) => {
                repo.sync_status = SyncStatus::Failed;
                repo.sync_error = Some(error.into());
                true
            }
            None => false,
        }
    }

    /// Deletes a repository and everything it owns: branches, commits,
    /// file-changes, files, and collaborators.
    ///
    /// The subscription row is transitioned to `Inactive` rather than
    /// removed, and code versions are archived, because both must remain
    /// queryable after the mirror is gone.
    pub fn delete_repository(&self, id: RepositoryId) -> bool {
        let mut inner = self.write();
        let Some(repo) = inner.repositories.remove(&id) else {
            return false;
        };
        inner.repo_by_full_name.remove(&repo.full_name);

        inner.branches.retain(|(repo_id, _), _| *repo_id != id);
        inner.collaborators.retain(|(repo_id, _), _| *repo_id != id);

        let commit_ids: Vec<CommitId> = inner
            .commits
            .values()
            .filter(|c| c.repository == id)
            .map(|c| c.id)
            .collect();
        for commit_id in commit_ids {
            inner.commits.remove(&commit_id);
            inner.file_changes.remove(&commit_id);
        }
        inner.commit_by_sha.retain(|(repo_id, _), _| *repo_id != id);

        let file_ids: Vec<FileId> = inner
            .files
            .values()
            .filter(|f| f.repository == id)
            .map(|f| f.id)
            .collect();
        for file_id in file_ids {
            inner.files.remove(&file_id);
        }
        inner.file_by_key.retain(|(repo_id, _, _), _| *repo_id != id);

        if let Some(sub) = inner.subscriptions.get_mut(&id) {
            sub.status = SubscriptionStatus::Inactive;
        }
        for version in inner.versions.values_mut() {
            if version.repository == id && version.status == VersionStatus::Active {
                version.status = VersionStatus::Archived;
            }
        }
        true
    }

    // ─── branches ───

    /// Inserts or fully replaces a branch row.
    ///
    /// Rejects a head SHA that has no commit row for the same repository, so
    /// a branch head can never point at a commit that is not durably stored.
    pub fn upsert_branch(
        &self,
        repository: RepositoryId,
        update: BranchUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        if !inner.repositories.contains_key(&repository) {
            return Err(StoreError::UnknownRepository(repository));
        }
        if !inner
            .commit_by_sha
            .contains_key(&(repository, update.head_sha.clone()))
        {
            return Err(StoreError::UnknownHeadCommit {
                branch: update.name,
                sha: update.head_sha,
            });
        }
        let branch = Branch {
            repository,
            name: update.name.clone(),
            head_sha: update.head_sha,
            protected: update.protected,
            is_default: update.is_default,
            last_commit: update.last_commit,
        };
        inner.branches.insert((repository, update.name), branch);
        Ok(())
    }

    pub fn branch(&self, repository: RepositoryId, name: &str) -> Option<Branch> {
        self.read()
            .branches
            .get(&(repository, name.to_string()))
            .cloned()
    }

    pub fn branches(&self, repository: RepositoryId) -> Vec<Branch> {
        let mut branches: Vec<_> = self
            .read()
            .branches
            .values()
            .filter(|b| b.repository == repository)
            .cloned()
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        branches
    }

    /// Removes a branch and its current-state file rows. Commits are kept;
    /// they belong to the repository, not the branch.
    pub fn delete_branch(&self, repository: RepositoryId, name: &str) -> bool {
        let mut inner = self.write();
        if inner
            .branches
            .remove(&(repository, name.to_string()))
            .is_none()
        {
            return false;
        }
        let file_ids: Vec<FileId> = inner
            .files
            .values()
            .filter(|f| f.repository == repository && f.branch == name)
            .map(|f| f.id)
            .collect();
        for file_id in file_ids {
            inner.files.remove(&file_id);
        }
        inner
            .file_by_key
            .retain(|(repo_id, branch, _), _| !(*repo_id == repository && branch == name));
        true
    }

    // ─── commits and file changes ───

    /// Inserts a commit together with its file-changes.
    ///
    /// Idempotent by (repository, sha): if the SHA is already stored, the
    /// existing row id is returned and nothing is written; reinserting the
    /// same commit is a no-op, not an error. Returns `(id, inserted)`.
    pub fn insert_commit(
        &self,
        repository: RepositoryId,
        new: NewCommit,
        changes: Vec<NewFileChange>,
    ) -> Result<(CommitId, bool), StoreError> {
        let mut inner = self.write();
        if !inner.repositories.contains_key(&repository) {
            return Err(StoreError::UnknownRepository(repository));
        }
        if let Some(existing) = inner.commit_by_sha.get(&(repository, new.sha.clone())) {
            return Ok((*existing, false));
        }

        let id = CommitId(inner.fresh_id());
        let commit = Commit {
            id,
            repository,
            sha: new.sha.clone(),
            message: new.message,
            author_name: new.author_name,
            author_email: new.author_email,
            committed_at: new.committed_at,
            additions: new.additions,
            deletions: new.deletions,
            files_changed: new.files_changed,
            branch: new.branch,
        };
        let rows: Vec<FileChange> = changes
            .into_iter()
            .map(|c| FileChange {
                repository,
                commit: id,
                path: c.path,
                change_type: c.change_type,
                additions: c.additions,
                deletions: c.deletions,
                patch: c.patch,
                previous_path: c.previous_path,
            })
            .collect();

        inner.commit_by_sha.insert((repository, new.sha), id);
        inner.commits.insert(id, commit);
        inner.file_changes.insert(id, rows);
        Ok((id, true))
    }

    pub fn has_commit(&self, repository: RepositoryId, sha: &Sha) -> bool {
        self.read()
            .commit_by_sha
            .contains_key(&(repository, sha.clone()))
    }

    pub fn commit(&self, id: CommitId) -> Option<Commit> {
        self.read().commits.get(&id).cloned()
    }

    pub fn commit_by_sha(&self, repository: RepositoryId, sha: &Sha) -> Option<Commit> {
        let inner = self.read();
        let id = inner.commit_by_sha.get(&(repository, sha.clone()))?;
        inner.commits.get(id).cloned()
    }

    pub fn file_changes(&self, commit: CommitId) -> Vec<FileChange> {
        self.read()
            .file_changes
            .get(&commit)
            .cloned()
            .unwrap_or_default()
    }

    pub fn commits_for_repository(&self, repository: RepositoryId) -> Vec<Commit> {
        let mut commits: Vec<_> = self
            .read()
            .commits
            .values()
            .filter(|c| c.repository == repository)
            .cloned()
            .collect();
        commits.sort_by_key(|c| c.id);
        commits
    }

    // ─── files ───

    /// Inserts or replaces the current state of one file on one branch.
    pub fn upsert_file(
        &self,
        repository: RepositoryId,
        branch: &str,
        path: &str,
        content: Option<String>,
        size: u64,
        last_commit_sha: Option<Sha>,
    ) -> FileId {
        let mut inner = self.write();
        let key = (repository, branch.to_string(), path.to_string());
        let id = match inner.file_by_key.get(&key) {
            Some(id) => *id,
            None => {
                let id = FileId(inner.fresh_id());
                inner.file_by_key.insert(key, id);
                id
            }
        };
        let row = File {
            id,
            repository,
            branch: branch.to_string(),
            path: path.to_string(),
            content,
            size,
            last_commit_sha,
        };
        inner.files.insert(id, row);
        id
    }

    pub fn file(&self, id: FileId) -> Option<File> {
        self.read().files.get(&id).cloned()
    }

    pub fn files_for_repository(&self, repository: RepositoryId, branch: Option<&str>) -> Vec<File> {
        let mut files: Vec<_> = self
            .read()
            .files
            .values()
            .filter(|f| f.repository == repository)
            .filter(|f| branch.is_none_or(|b| f.branch == b))
            .cloned()
            .collect();
        files.sort_by(|a, b| (&a.branch, &a.path).cmp(&(&b.branch, &b.path)));
        files
    }

    // ─── collaborators ───

    /// Inserts or replaces a collaborator row, keyed by (repository, username).
    pub fn upsert_collaborator(&self, collaborator: Collaborator) {
        let mut inner = self.write();
        let key = (collaborator.repository, collaborator.username.clone());
        inner.collaborators.insert(key, collaborator);
    }

    pub fn collaborators(&self, repository: RepositoryId) -> Vec<Collaborator> {
        let mut rows: Vec<_> = self
            .read()
            .collaborators
            .values()
            .filter(|c| c.repository == repository)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        rows
    }

    /// Soft-deactivates a collaborator (audit history preserved).
    pub fn deactivate_collaborator(&self, repository: RepositoryId, username: &str) -> bool {
        let mut inner = self.write();
        match inner
            .collaborators
            .get_mut(&(repository, username.to_string()))
        {
            Some(c) => {
                c.active = false;
                true
            }
            None => false,
        }
    }

    /// Adds to a collaborator's contribution counter, creating nothing.
    pub fn add_contributions(&self, repository: RepositoryId, username: &str, count: u64) {
        let mut inner = self.write();
        if let Some(c) = inner
            .collaborators
            .get_mut(&(repository, username.to_string()))
        {
            c.contributions += count;
        }
    }

    // ─── subscriptions ───

    pub fn upsert_subscription(&self, subscription: WebhookSubscription) {
        let mut inner = self.write();
        inner
            .subscriptions
            .insert(subscription.repository, subscription);
    }

    pub fn subscription(&self, repository: RepositoryId) -> Option<WebhookSubscription> {
        self.read().subscriptions.get(&repository).cloned()
    }

    pub fn all_subscriptions(&self) -> Vec<WebhookSubscription> {
        let mut subs: Vec<_> = self.read().subscriptions.values().cloned().collect();
        subs.sort_by_key(|s| s.repository);
        subs
    }

    /// Finds the repository whose subscription matches the hook id.
    pub fn subscription_by_hook(&self, hook_id: HookId) -> Option<WebhookSubscription> {
        self.read()
            .subscriptions
            .values()
            .find(|s| s.hook_id == Some(hook_id))
            .cloned()
    }

    /// Finds a subscription by repository identity (remote id or full name).
    pub fn subscription_by_identity(
        &self,
        remote_id: Option<RemoteId>,
        full_name: Option<&RepoFullName>,
    ) -> Option<WebhookSubscription> {
        self.read()
            .subscriptions
            .values()
            .find(|s| {
                (remote_id.is_some() && s.remote_id == remote_id)
                    || full_name.is_some_and(|n| &s.repo_full_name == n)
            })
            .cloned()
    }

    /// Applies a mutation to a subscription row, if it exists.
    pub fn modify_subscription<F>(&self, repository: RepositoryId, mutate: F) -> bool
    where
        F: FnOnce(&mut WebhookSubscription),
    {
        let mut inner = self.write();
        match inner.subscriptions.get_mut(&repository) {
            Some(sub) => {
                mutate(sub);
                true
            }
            None => false,
        }
    }

    // ─── code versions ───

    /// Appends an immutable version snapshot; the store assigns id and
    /// creation time.
    pub fn append_version(&self, new: NewVersion) -> VersionId {
        let mut inner = self.write();
        let id = VersionId(inner.fresh_id());
        let row = CodeVersion {
            id,
            repository: new.repository,
            path: new.path.clone(),
            commit_sha: new.commit_sha.clone(),
            branch: new.branch,
            content: new.content,
            author: new.author,
            status: VersionStatus::Active,
            parent: new.parent,
            created_at: Utc::now(),
            stats: new.stats,
        };
        inner
            .versions_by_path
            .entry((new.repository, new.path))
            .or_default()
            .push(id);
        inner
            .version_commits
            .entry((new.repository, new.commit_sha))
            .or_default()
            .push(id);
        inner.versions.insert(id, row);
        id
    }

    pub fn version(&self, id: VersionId) -> Option<CodeVersion> {
        self.read().versions.get(&id).cloned()
    }

    /// All versions of one path, in creation order.
    pub fn versions_for_path(&self, repository: RepositoryId, path: &str) -> Vec<CodeVersion> {
        let inner = self.read();
        inner
            .versions_by_path
            .get(&(repository, path.to_string()))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.versions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recent `Active` version of one path.
    pub fn latest_active_version(
        &self,
        repository: RepositoryId,
        path: &str,
    ) -> Option<CodeVersion> {
        self.versions_for_path(repository, path)
            .into_iter()
            .rev()
            .find(|v| v.status == VersionStatus::Active)
    }

    /// Whether any versions were already created for this commit, the
    /// duplicate-processing guard of the version engine.
    pub fn has_versions_for_commit(&self, repository: RepositoryId, sha: &Sha) -> bool {
        self.read()
            .version_commits
            .contains_key(&(repository, sha.clone()))
    }

    pub fn active_versions(&self, repository: RepositoryId) -> Vec<CodeVersion> {
        let mut versions: Vec<_> = self
            .read()
            .versions
            .values()
            .filter(|v| v.repository == repository && v.status == VersionStatus::Active)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.id);
        versions
    }

    /// Archives all active versions created strictly before `before`.
    /// Returns the number of rows transitioned.
    pub fn archive_versions_before(
        &self,
        repository: RepositoryId,
        before: DateTime<Utc>,
    ) -> usize {
        let mut inner = self.write();
        let mut archived = 0;
        for version in inner.versions.values_mut() {
            if version.repository == repository
                && version.status == VersionStatus::Active
                && version.created_at < before
            {
                version.status = VersionStatus::Archived;
                archived += 1;
            }
        }
        archived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::entities::LastCommit;
    use crate::types::{ChangeType, Permission, UserId};

    fn store_with_repo() -> (MirrorStore, RepositoryId) {
        let store = MirrorStore::new();
        let id = store
            .create_repository(NewRepository {
                remote_id: Some(RemoteId(99)),
                full_name: RepoFullName::new("org/repo"),
                owner: UserId(1),
                private: true,
                default_branch: "main".to_string(),
            })
            .unwrap();
        (store, id)
    }

    fn commit(sha: &str) -> NewCommit {
        NewCommit {
            sha: Sha::new(sha),
            message: "message".to_string(),
            author_name: "author".to_string(),
            author_email: "author@example.edu".to_string(),
            committed_at: None,
            additions: 1,
            deletions: 0,
            files_changed: 1,
            branch: Some("main".to_string()),
        }
    }

    fn change(path: &str) -> NewFileChange {
        NewFileChange {
            path: path.to_string(),
            change_type: ChangeType::Modified,
            additions: 1,
            deletions: 0,
            patch: None,
            previous_path: None,
        }
    }

    #[test]
    fn create_repository_rejects_duplicate_full_name() {
        let (store, _) = store_with_repo();
        let err = store
            .create_repository(NewRepository {
                remote_id: None,
                full_name: RepoFullName::new("org/repo"),
                owner: UserId(2),
                private: false,
                default_branch: "main".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRepository(_)));
    }

    #[test]
    fn new_repository_starts_pending() {
        let (store, id) = store_with_repo();
        let repo = store.repository(id).unwrap();
        assert_eq!(repo.sync_status, SyncStatus::Pending);
        assert!(repo.last_synced_at.is_none());
    }

    #[test]
    fn insert_commit_is_idempotent_by_sha() {
        let (store, repo) = store_with_repo();

        let (id1, inserted1) = store
            .insert_commit(repo, commit("abc123"), vec![change("src/App.java")])
            .unwrap();
        let (id2, inserted2) = store
            .insert_commit(repo, commit("abc123"), vec![change("src/App.java")])
            .unwrap();

        assert!(inserted1);
        assert!(!inserted2);
        assert_eq!(id1, id2);
        assert_eq!(store.commits_for_repository(repo).len(), 1);
        assert_eq!(store.file_changes(id1).len(), 1);
    }

    #[test]
    fn file_changes_stored_with_commit() {
        let (store, repo) = store_with_repo();
        let (id, _) = store
            .insert_commit(
                repo,
                commit("abc123"),
                vec![change("a.java"), change("b.java")],
            )
            .unwrap();

        let changes = store.file_changes(id);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.commit == id && c.repository == repo));
    }

    #[test]
    fn branch_head_must_reference_stored_commit() {
        let (store, repo) = store_with_repo();

        let err = store
            .upsert_branch(
                repo,
                BranchUpdate {
                    name: "main".to_string(),
                    head_sha: Sha::new("missing"),
                    protected: false,
                    is_default: true,
                    last_commit: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownHeadCommit { .. }));
        assert!(store.branch(repo, "main").is_none());

        store.insert_commit(repo, commit("abc123"), vec![]).unwrap();
        store
            .upsert_branch(
                repo,
                BranchUpdate {
                    name: "main".to_string(),
                    head_sha: Sha::new("abc123"),
                    protected: false,
                    is_default: true,
                    last_commit: Some(LastCommit {
                        sha: Sha::new("abc123"),
                        message: "message".to_string(),
                        author: "author".to_string(),
                        committed_at: None,
                    }),
                },
            )
            .unwrap();
        assert_eq!(store.branch(repo, "main").unwrap().head_sha.as_str(), "abc123");
    }

    #[test]
    fn upsert_branch_replaces_denormalized_fields() {
        let (store, repo) = store_with_repo();
        store.insert_commit(repo, commit("aaa"), vec![]).unwrap();
        store.insert_commit(repo, commit("bbb"), vec![]).unwrap();

        let update = |sha: &str| BranchUpdate {
            name: "main".to_string(),
            head_sha: Sha::new(sha),
            protected: false,
            is_default: true,
            last_commit: Some(LastCommit {
                sha: Sha::new(sha),
                message: format!("commit {sha}"),
                author: "author".to_string(),
                committed_at: None,
            }),
        };

        store.upsert_branch(repo, update("aaa")).unwrap();
        store.upsert_branch(repo, update("bbb")).unwrap();

        let branch = store.branch(repo, "main").unwrap();
        assert_eq!(branch.head_sha.as_str(), "bbb");
        assert_eq!(branch.last_commit.unwrap().message, "commit bbb");
        assert_eq!(store.branches(repo).len(), 1);
    }

    #[test]
    fn delete_branch_removes_its_files() {
        let (store, repo) = store_with_repo();
        store.insert_commit(repo, commit("aaa"), vec![]).unwrap();
        store
            .upsert_branch(
                repo,
                BranchUpdate {
                    name: "dev".to_string(),
                    head_sha: Sha::new("aaa"),
                    protected: false,
                    is_default: false,
                    last_commit: None,
                },
            )
            .unwrap();
        store.upsert_file(repo, "dev", "a.java", None, 10, None);
        store.upsert_file(repo, "main", "a.java", None, 10, None);

        assert!(store.delete_branch(repo, "dev"));

        assert!(store.branch(repo, "dev").is_none());
        let files = store.files_for_repository(repo, None);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].branch, "main");
        // Commits survive branch deletion.
        assert_eq!(store.commits_for_repository(repo).len(), 1);
    }

    #[test]
    fn upsert_file_replaces_current_state() {
        let (store, repo) = store_with_repo();
        let id1 = store.upsert_file(repo, "main", "a.java", Some("v1".into()), 2, None);
        let id2 = store.upsert_file(repo, "main", "a.java", Some("v2".into()), 2, None);

        assert_eq!(id1, id2);
        assert_eq!(store.file(id1).unwrap().content.as_deref(), Some("v2"));
        assert_eq!(store.files_for_repository(repo, Some("main")).len(), 1);
    }

    #[test]
    fn collaborator_soft_deactivation() {
        let (store, repo) = store_with_repo();
        store.upsert_collaborator(Collaborator {
            repository: repo,
            username: "student1".to_string(),
            permission: Permission::Write,
            contributions: 3,
            user: Some(UserId(7)),
            active: true,
        });

        assert!(store.deactivate_collaborator(repo, "student1"));

        let rows = store.collaborators(repo);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].active);
        assert_eq!(rows[0].contributions, 3);
    }

    #[test]
    fn delete_repository_cascades() {
        let (store, repo) = store_with_repo();
        let (commit_id, _) = store
            .insert_commit(repo, commit("abc"), vec![change("a.java")])
            .unwrap();
        store
            .upsert_branch(
                repo,
                BranchUpdate {
                    name: "main".to_string(),
                    head_sha: Sha::new("abc"),
                    protected: false,
                    is_default: true,
                    last_commit: None,
                },
            )
            .unwrap();
        store.upsert_file(repo, "main", "a.java", None, 1, None);
        store.upsert_collaborator(Collaborator {
            repository: repo,
            username: "student1".to_string(),
            permission: Permission::Read,
            contributions: 0,
            user: None,
            active: true,
        });
        let version = store.append_version(NewVersion {
            repository: repo,
            path: "a.java".to_string(),
            commit_sha: Sha::new("abc"),
            branch: "main".to_string(),
            content: "x".to_string(),
            author: "author".to_string(),
            parent: None,
            stats: Default::default(),
        });

        assert!(store.delete_repository(repo));

        assert!(store.repository(repo).is_none());
        assert!(store.branches(repo).is_empty());
        assert!(store.commits_for_repository(repo).is_empty());
        assert!(store.file_changes(commit_id).is_empty());
        assert!(store.files_for_repository(repo, None).is_empty());
        assert!(store.collaborators(repo).is_empty());
        // Version history survives, archived.
        assert_eq!(
            store.version(version).unwrap().status,
            VersionStatus::Archived
        );
    }

    #[test]
    fn version_parent_chain_and_latest_active() {
        let (store, repo) = store_with_repo();
        let new_version = |sha: &str, parent: Option<VersionId>| NewVersion {
            repository: repo,
            path: "a.java".to_string(),
            commit_sha: Sha::new(sha),
            branch: "main".to_string(),
            content: sha.to_string(),
            author: "author".to_string(),
            parent,
            stats: Default::default(),
        };

        let v1 = store.append_version(new_version("s1", None));
        let v2 = store.append_version(new_version("s2", Some(v1)));
        let v3 = store.append_version(new_version("s3", Some(v2)));

        assert_eq!(store.version(v3).unwrap().parent, Some(v2));
        assert_eq!(store.version(v2).unwrap().parent, Some(v1));
        assert_eq!(store.version(v1).unwrap().parent, None);

        let latest = store.latest_active_version(repo, "a.java").unwrap();
        assert_eq!(latest.id, v3);

        assert!(store.has_versions_for_commit(repo, &Sha::new("s2")));
        assert!(!store.has_versions_for_commit(repo, &Sha::new("s9")));
    }

    #[test]
    fn archive_versions_before_cutoff() {
        let (store, repo) = store_with_repo();
        let v1 = store.append_version(NewVersion {
            repository: repo,
            path: "a.java".to_string(),
            commit_sha: Sha::new("s1"),
            branch: "main".to_string(),
            content: "one".to_string(),
            author: "author".to_string(),
            parent: None,
            stats: Default::default(),
        });
        let cutoff = Utc::now();
        let v2 = store.append_version(NewVersion {
            repository: repo,
            path: "a.java".to_string(),
            commit_sha: Sha::new("s2"),
            branch: "main".to_string(),
            content: "two".to_string(),
            author: "author".to_string(),
            parent: Some(v1),
            stats: Default::default(),
        });

        let archived = store.archive_versions_before(repo, cutoff);

        assert_eq!(archived, 1);
        assert_eq!(store.version(v1).unwrap().status, VersionStatus::Archived);
        assert_eq!(store.version(v2).unwrap().status, VersionStatus::Active);
        // Archived rows remain queryable.
        assert_eq!(store.versions_for_path(repo, "a.java").len(), 2);
    }

    #[test]
    fn subscription_lookup_by_hook_then_identity() {
        let (store, repo) = store_with_repo();
        store.upsert_subscription(WebhookSubscription {
            repository: repo,
            repo_full_name: RepoFullName::new("org/repo"),
            remote_id: Some(RemoteId(99)),
            hook_id: Some(HookId(42)),
            status: SubscriptionStatus::Active,
            failure_count: 0,
            last_delivery: None,
            last_error: None,
            created_at: Utc::now(),
        });

        assert!(store.subscription_by_hook(HookId(42)).is_some());
        assert!(store.subscription_by_hook(HookId(1)).is_none());
        assert!(
            store
                .subscription_by_identity(Some(RemoteId(99)), None)
                .is_some()
        );
        assert!(
            store
                .subscription_by_identity(None, Some(&RepoFullName::new("org/repo")))
                .is_some()
        );
        assert!(
            store
                .subscription_by_identity(None, Some(&RepoFullName::new("org/other")))
                .is_none()
        );
    }
}
