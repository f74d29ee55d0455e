//! Shared test fixtures.
//!
//! [`MockProvider`] is a programmable in-memory [`Provider`] used by the sync
//! engine and HTTP tests. Fixture data is set up through the `set_*` methods;
//! `fail_with` makes every subsequent call fail, for exercising failure
//! paths.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};

use crate::provider::{
    Provider, ProviderError, RemoteBranch, RemoteCollaborator, RemoteCommitDetail,
    RemoteCommitSummary, RemoteFileChange, RemoteFileContent, RemoteRepository,
};
use crate::types::{HookId, RemoteId, RepoFullName, Sha};

#[derive(Default)]
struct MockInner {
    repositories: HashMap<RepoFullName, RemoteRepository>,
    branches: HashMap<RepoFullName, Vec<RemoteBranch>>,
    /// Newest first, as the commits listing endpoint returns them.
    commits: HashMap<(RepoFullName, String), Vec<RemoteCommitSummary>>,
    commit_details: HashMap<Sha, RemoteCommitDetail>,
    /// Keyed by (ref, path), where the ref is a branch name or commit SHA.
    file_contents: HashMap<(String, String), RemoteFileContent>,
    collaborators: HashMap<RepoFullName, Vec<RemoteCollaborator>>,
    user_repositories: HashMap<String, Vec<RemoteRepository>>,
    failure: Option<String>,
    next_hook_id: u64,
    registered_hooks: Vec<(RepoFullName, String)>,
    removed_hooks: Vec<(RepoFullName, HookId)>,
}

/// A fully in-memory provider for tests.
#[derive(Default)]
pub struct MockProvider {
    inner: Mutex<MockInner>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_repository(&self, repo: RemoteRepository) {
        self.lock().repositories.insert(repo.full_name.clone(), repo);
    }

    pub fn set_branches(&self, repo: &RepoFullName, branches: Vec<RemoteBranch>) {
        self.lock().branches.insert(repo.clone(), branches);
    }

    /// Sets the commits listing for a branch, newest first.
    pub fn set_commits(&self, repo: &RepoFullName, branch: &str, commits: Vec<RemoteCommitSummary>) {
        self.lock()
            .commits
            .insert((repo.clone(), branch.to_string()), commits);
    }

    pub fn set_commit_detail(&self, detail: RemoteCommitDetail) {
        self.lock()
            .commit_details
            .insert(detail.summary.sha.clone(), detail);
    }

    /// Sets the content served for a path at one ref (branch or SHA).
    pub fn set_file_content(&self, reference: &str, path: &str, content: &str) {
        self.lock().file_contents.insert(
            (reference.to_string(), path.to_string()),
            RemoteFileContent {
                content: content.to_string(),
                size: content.len() as u64,
            },
        );
    }

    pub fn set_collaborators(&self, repo: &RepoFullName, collaborators: Vec<RemoteCollaborator>) {
        self.lock().collaborators.insert(repo.clone(), collaborators);
    }

    pub fn set_user_repositories(&self, owner: &str, repos: Vec<RemoteRepository>) {
        self.lock()
            .user_repositories
            .insert(owner.to_string(), repos);
    }

    /// Makes every subsequent call fail with a transport error.
    pub fn fail_with(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    /// Clears a previously injected failure.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    pub fn registered_hooks(&self) -> Vec<(RepoFullName, String)> {
        self.lock().registered_hooks.clone()
    }

    pub fn removed_hooks(&self) -> Vec<(RepoFullName, HookId)> {
        self.lock().removed_hooks.clone()
    }

    fn check_failure(&self) -> Result<(), ProviderError> {
        match &self.lock().failure {
            Some(message) => Err(ProviderError::Http(message.clone())),
            None => Ok(()),
        }
    }
}

impl Provider for MockProvider {
    async fn fetch_repository(&self, repo: &RepoFullName) -> Result<RemoteRepository, ProviderError> {
        self.check_failure()?;
        self.lock()
            .repositories
            .get(repo)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(repo.to_string()))
    }

    async fn fetch_branches(&self, repo: &RepoFullName) -> Result<Vec<RemoteBranch>, ProviderError> {
        self.check_failure()?;
        Ok(self.lock().branches.get(repo).cloned().unwrap_or_default())
    }

    async fn fetch_recent_commits(
        &self,
        repo: &RepoFullName,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<RemoteCommitSummary>, ProviderError> {
        self.check_failure()?;
        let mut commits = self
            .lock()
            .commits
            .get(&(repo.clone(), branch.to_string()))
            .cloned()
            .unwrap_or_default();
        commits.truncate(limit);
        Ok(commits)
    }

    async fn fetch_commit(
        &self,
        _repo: &RepoFullName,
        sha: &Sha,
    ) -> Result<RemoteCommitDetail, ProviderError> {
        self.check_failure()?;
        self.lock()
            .commit_details
            .get(sha)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(sha.to_string()))
    }

    async fn fetch_file_content(
        &self,
        _repo: &RepoFullName,
        reference: &str,
        path: &str,
    ) -> Result<Option<RemoteFileContent>, ProviderError> {
        self.check_failure()?;
        Ok(self
            .lock()
            .file_contents
            .get(&(reference.to_string(), path.to_string()))
            .cloned())
    }

    async fn fetch_collaborators(
        &self,
        repo: &RepoFullName,
    ) -> Result<Vec<RemoteCollaborator>, ProviderError> {
        self.check_failure()?;
        Ok(self
            .lock()
            .collaborators
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_user_repositories(
        &self,
        owner_login: &str,
    ) -> Result<Vec<RemoteRepository>, ProviderError> {
        self.check_failure()?;
        Ok(self
            .lock()
            .user_repositories
            .get(owner_login)
            .cloned()
            .unwrap_or_default())
    }

    async fn register_webhook(
        &self,
        repo: &RepoFullName,
        callback_url: &str,
    ) -> Result<HookId, ProviderError> {
        self.check_failure()?;
        let mut inner = self.lock();
        inner.next_hook_id += 1;
        let id = HookId(inner.next_hook_id);
        inner
            .registered_hooks
            .push((repo.clone(), callback_url.to_string()));
        Ok(id)
    }

    async fn remove_webhook(&self, repo: &RepoFullName, hook: HookId) -> Result<(), ProviderError> {
        self.check_failure()?;
        self.lock().removed_hooks.push((repo.clone(), hook));
        Ok(())
    }
}

/// Builds a commit summary with deterministic author fields.
pub fn commit_summary(sha: &str, message: &str) -> RemoteCommitSummary {
    RemoteCommitSummary {
        sha: Sha::new(sha),
        message: message.to_string(),
        author_name: "student1".to_string(),
        author_email: "student1@example.edu".to_string(),
        committed_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
    }
}

/// Builds a commit detail touching the given paths as "modified".
pub fn commit_detail(sha: &str, message: &str, paths: &[&str]) -> RemoteCommitDetail {
    RemoteCommitDetail {
        summary: commit_summary(sha, message),
        additions: paths.len() as u64,
        deletions: 0,
        files: paths
            .iter()
            .map(|p| RemoteFileChange {
                path: p.to_string(),
                status: "modified".to_string(),
                additions: 1,
                deletions: 0,
                patch: Some("@@ -1 +1 @@".to_string()),
                previous_path: None,
            })
            .collect(),
    }
}

/// Builds a remote repository row.
pub fn remote_repository(id: u64, full_name: &str, default_branch: &str) -> RemoteRepository {
    RemoteRepository {
        remote_id: RemoteId(id),
        full_name: RepoFullName::new(full_name),
        private: false,
        default_branch: default_branch.to_string(),
    }
}

/// Builds a remote branch head.
pub fn remote_branch(name: &str, head: &str) -> RemoteBranch {
    RemoteBranch {
        name: name.to_string(),
        head_sha: Sha::new(head),
        protected: false,
    }
}
