//! Read API over the mirror store.
//!
//! Absence semantics: an entity that does not exist is 404; a repository that
//! exists but holds nothing yet answers 200 with empty lists. Store reads
//! return `Option`/empty `Vec`, and the 404 translation happens only here.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::RepositoryStatistics;
use crate::provider::Provider;
use crate::store::{Branch, CodeVersion, Commit, FileChange, Repository};
use crate::types::{CommitId, FileId, RepositoryId, Sha};

use super::{ApiError, AppState};

/// Repository row plus its branches.
#[derive(Debug, Serialize)]
pub struct RepositoryDetail {
    #[serde(flatten)]
    pub repository: Repository,
    pub branches: Vec<Branch>,
}

/// File listing entry; content is served by the dedicated endpoint.
#[derive(Debug, Serialize)]
pub struct FileSummary {
    pub id: FileId,
    pub branch: String,
    pub path: String,
    pub size: u64,
    pub last_commit_sha: Option<Sha>,
}

#[derive(Debug, Serialize)]
pub struct FileContent {
    pub id: FileId,
    pub branch: String,
    pub path: String,
    pub content: Option<String>,
    pub size: u64,
}

/// Commit row plus its file changes.
#[derive(Debug, Serialize)]
pub struct CommitDetail {
    #[serde(flatten)]
    pub commit: Commit,
    pub files: Vec<FileChange>,
}

pub async fn list_repositories<P: Provider>(
    State(state): State<AppState<P>>,
) -> Json<Vec<Repository>> {
    Json(state.store.repositories())
}

pub async fn repository<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
) -> Result<Json<RepositoryDetail>, ApiError> {
    let id = RepositoryId(id);
    let repository = state
        .store
        .repository(id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown repository: {id}")))?;
    Ok(Json(RepositoryDetail {
        repository,
        branches: state.store.branches(id),
    }))
}

pub async fn delete_repository<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let id = RepositoryId(id);
    if !state.store.delete_repository(id) {
        return Err(ApiError::NotFound(format!("unknown repository: {id}")));
    }
    info!(repository = %id, "repository deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    pub branch: Option<String>,
}

pub async fn repository_files<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Vec<FileSummary>>, ApiError> {
    let id = RepositoryId(id);
    require_repository(&state, id)?;
    let files = state
        .store
        .files_for_repository(id, query.branch.as_deref())
        .into_iter()
        .map(|f| FileSummary {
            id: f.id,
            branch: f.branch,
            path: f.path,
            size: f.size,
            last_commit_sha: f.last_commit_sha,
        })
        .collect();
    Ok(Json(files))
}

pub async fn file_content<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
) -> Result<Json<FileContent>, ApiError> {
    let id = FileId(id);
    let file = state
        .store
        .file(id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown file: {id}")))?;
    Ok(Json(FileContent {
        id: file.id,
        branch: file.branch,
        path: file.path,
        content: file.content,
        size: file.size,
    }))
}

pub async fn repository_commits<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Commit>>, ApiError> {
    let id = RepositoryId(id);
    require_repository(&state, id)?;
    Ok(Json(state.store.commits_for_repository(id)))
}

pub async fn commit<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
) -> Result<Json<CommitDetail>, ApiError> {
    let id = CommitId(id);
    let commit = state
        .store
        .commit(id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown commit: {id}")))?;
    Ok(Json(CommitDetail {
        commit,
        files: state.store.file_changes(id),
    }))
}

pub async fn repository_statistics<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
) -> Result<Json<RepositoryStatistics>, ApiError> {
    let id = RepositoryId(id);
    state
        .aggregator
        .repository_statistics(id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unknown repository: {id}")))
}

#[derive(Debug, Deserialize)]
pub struct VersionsQuery {
    pub path: Option<String>,
}

/// Full version history of one path, oldest first.
pub async fn version_history<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
    Query(query): Query<VersionsQuery>,
) -> Result<Json<Vec<CodeVersion>>, ApiError> {
    let id = RepositoryId(id);
    require_repository(&state, id)?;
    let path = query
        .path
        .ok_or_else(|| ApiError::BadRequest("missing path query parameter".to_string()))?;
    Ok(Json(state.versions.file_history(id, &path)))
}

/// The latest active version of every path in the repository.
pub async fn current_versions<P: Provider>(
    State(state): State<AppState<P>>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<CodeVersion>>, ApiError> {
    let id = RepositoryId(id);
    require_repository(&state, id)?;
    let mut latest: BTreeMap<String, CodeVersion> = BTreeMap::new();
    for version in state.store.active_versions(id) {
        // Active versions are listed in creation order; the last one per
        // path wins.
        latest.insert(version.path.clone(), version);
    }
    Ok(Json(latest.into_values().collect()))
}

fn require_repository<P>(state: &AppState<P>, id: RepositoryId) -> Result<(), ApiError> {
    if state.store.repository(id).is_none() {
        return Err(ApiError::NotFound(format!("unknown repository: {id}")));
    }
    Ok(())
}
