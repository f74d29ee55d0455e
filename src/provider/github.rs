//! GitHub-backed [`Provider`] implementation over octocrab.
//!
//! Uses octocrab's generic REST methods with thin deserialization structs
//! rather than its typed models, because the sync engine only needs a small
//! projection of each payload. Every call carries a bounded timeout; on
//! expiry the call fails with [`ProviderError::Timeout`] and no state has
//! been touched.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::Deserialize;
use serde_json::json;

use crate::types::{HookId, RemoteId, RepoFullName, Sha};

use super::{
    Provider, ProviderError, RemoteBranch, RemoteCollaborator, RemoteCommitDetail,
    RemoteCommitSummary, RemoteFileChange, RemoteFileContent, RemoteRepository,
};

/// GitHub REST API client with per-call timeouts.
pub struct GitHubProvider {
    client: Octocrab,
    timeout: Duration,
}

impl GitHubProvider {
    pub fn new(client: Octocrab, timeout: Duration) -> Self {
        GitHubProvider { client, timeout }
    }

    /// Builds a provider from a personal access token.
    pub fn from_token(
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client, timeout))
    }

    /// Builds an unauthenticated provider. Subject to much stricter rate
    /// limits; only suitable for public repositories.
    pub fn anonymous(timeout: Duration) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().build()?;
        Ok(Self::new(client, timeout))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, octocrab::Error>>,
    ) -> Result<T, ProviderError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(map_octocrab_error),
            Err(_) => Err(ProviderError::Timeout),
        }
    }
}

fn map_octocrab_error(err: octocrab::Error) -> ProviderError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            match status {
                404 => ProviderError::NotFound(source.message.clone()),
                403 | 429 => ProviderError::RateLimited,
                _ => ProviderError::Api {
                    status,
                    message: source.message.clone(),
                },
            }
        }
        other => ProviderError::Http(other.to_string()),
    }
}

// Thin deserialization targets for the REST payloads.

#[derive(Debug, Deserialize)]
struct RawRepo {
    id: u64,
    full_name: String,
    private: bool,
    default_branch: Option<String>,
}

impl From<RawRepo> for RemoteRepository {
    fn from(raw: RawRepo) -> Self {
        RemoteRepository {
            remote_id: RemoteId(raw.id),
            full_name: RepoFullName::new(raw.full_name),
            private: raw.private,
            default_branch: raw.default_branch.unwrap_or_else(|| "main".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBranch {
    name: String,
    commit: RawBranchHead,
    #[serde(default)]
    protected: bool,
}

#[derive(Debug, Deserialize)]
struct RawBranchHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RawCommitListItem {
    sha: String,
    commit: RawGitCommit,
}

#[derive(Debug, Deserialize)]
struct RawGitCommit {
    message: String,
    author: Option<RawGitAuthor>,
}

#[derive(Debug, Deserialize)]
struct RawGitAuthor {
    name: Option<String>,
    email: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    sha: String,
    commit: RawGitCommit,
    stats: Option<RawStats>,
    #[serde(default)]
    files: Vec<RawCommitFile>,
}

#[derive(Debug, Deserialize)]
struct RawStats {
    additions: u64,
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct RawCommitFile {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    patch: Option<String>,
    previous_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCollaborator {
    login: String,
    role_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHook {
    id: u64,
}

fn summary_from(sha: String, commit: RawGitCommit) -> RemoteCommitSummary {
    let author = commit.author.unwrap_or(RawGitAuthor {
        name: None,
        email: None,
        date: None,
    });
    RemoteCommitSummary {
        sha: Sha::new(sha),
        message: commit.message,
        author_name: author.name.unwrap_or_else(|| "unknown".to_string()),
        author_email: author.email.unwrap_or_default(),
        committed_at: author.date,
    }
}

impl Provider for GitHubProvider {
    async fn fetch_repository(&self, repo: &RepoFullName) -> Result<RemoteRepository, ProviderError> {
        let route = format!("/repos/{repo}");
        let raw: RawRepo = self.bounded(self.client.get(route, None::<&()>)).await?;
        Ok(raw.into())
    }

    async fn fetch_branches(&self, repo: &RepoFullName) -> Result<Vec<RemoteBranch>, ProviderError> {
        let route = format!("/repos/{repo}/branches?per_page=100");
        let raw: Vec<RawBranch> = self.bounded(self.client.get(route, None::<&()>)).await?;
        Ok(raw
            .into_iter()
            .map(|b| RemoteBranch {
                name: b.name,
                head_sha: Sha::new(b.commit.sha),
                protected: b.protected,
            })
            .collect())
    }

    async fn fetch_recent_commits(
        &self,
        repo: &RepoFullName,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<RemoteCommitSummary>, ProviderError> {
        let route = format!("/repos/{repo}/commits?sha={branch}&per_page={limit}");
        let raw: Vec<RawCommitListItem> =
            self.bounded(self.client.get(route, None::<&()>)).await?;
        Ok(raw
            .into_iter()
            .map(|c| summary_from(c.sha, c.commit))
            .collect())
    }

    async fn fetch_commit(
        &self,
        repo: &RepoFullName,
        sha: &Sha,
    ) -> Result<RemoteCommitDetail, ProviderError> {
        let route = format!("/repos/{repo}/commits/{sha}");
        let raw: RawCommitDetail = self.bounded(self.client.get(route, None::<&()>)).await?;
        let stats = raw.stats.unwrap_or(RawStats {
            additions: 0,
            deletions: 0,
        });
        Ok(RemoteCommitDetail {
            summary: summary_from(raw.sha, raw.commit),
            additions: stats.additions,
            deletions: stats.deletions,
            files: raw
                .files
                .into_iter()
                .map(|f| RemoteFileChange {
                    path: f.filename,
                    status: f.status,
                    additions: f.additions,
                    deletions: f.deletions,
                    patch: f.patch,
                    previous_path: f.previous_filename,
                })
                .collect(),
        })
    }

    async fn fetch_file_content(
        &self,
        repo: &RepoFullName,
        reference: &str,
        path: &str,
    ) -> Result<Option<RemoteFileContent>, ProviderError> {
        let repos = self.client.repos(repo.owner(), repo.name());
        let call = repos.get_content().path(path).r#ref(reference).send();
        let items = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(items)) => items,
            Ok(Err(err)) => {
                return match map_octocrab_error(err) {
                    ProviderError::NotFound(_) => Ok(None),
                    other => Err(other),
                };
            }
            Err(_) => return Err(ProviderError::Timeout),
        };
        Ok(items.items.into_iter().next().and_then(|item| {
            let size = item.size as u64;
            item.decoded_content()
                .map(|content| RemoteFileContent { content, size })
        }))
    }

    async fn fetch_collaborators(
        &self,
        repo: &RepoFullName,
    ) -> Result<Vec<RemoteCollaborator>, ProviderError> {
        let route = format!("/repos/{repo}/collaborators?per_page=100");
        let raw: Vec<RawCollaborator> =
            self.bounded(self.client.get(route, None::<&()>)).await?;
        Ok(raw
            .into_iter()
            .map(|c| RemoteCollaborator {
                username: c.login,
                permission: c.role_name.unwrap_or_else(|| "pull".to_string()),
            })
            .collect())
    }

    async fn list_user_repositories(
        &self,
        owner_login: &str,
    ) -> Result<Vec<RemoteRepository>, ProviderError> {
        let route = format!("/users/{owner_login}/repos?per_page=100");
        let raw: Vec<RawRepo> = self.bounded(self.client.get(route, None::<&()>)).await?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn register_webhook(
        &self,
        repo: &RepoFullName,
        callback_url: &str,
    ) -> Result<HookId, ProviderError> {
        let route = format!("/repos/{repo}/hooks");
        let body = json!({
            "name": "web",
            "active": true,
            "events": [
                "push", "pull_request", "issues", "create", "delete",
                "release", "fork", "watch"
            ],
            "config": {
                "url": callback_url,
                "content_type": "json"
            }
        });
        let raw: RawHook = self.bounded(self.client.post(route, Some(&body))).await?;
        Ok(HookId(raw.id))
    }

    async fn remove_webhook(&self, repo: &RepoFullName, hook: HookId) -> Result<(), ProviderError> {
        let route = format!("/repos/{repo}/hooks/{hook}");
        let call = self.client._delete(route, None::<&()>);
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(map_octocrab_error)?,
            Err(_) => return Err(ProviderError::Timeout),
        };
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Api {
                status: response.status().as_u16(),
                message: "hook deletion failed".to_string(),
            })
        }
    }
}
