//! The code version engine.
//!
//! Builds the append-only per-file version history from synced commits. Each
//! processed commit yields at most one new version per touched source file,
//! chained to the previous version of the same path. Processing is idempotent
//! at commit granularity: a commit that already produced versions is skipped
//! entirely, so a webhook-triggered sync and a bulk resync observing the same
//! commit cannot double its history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::store::{CodeVersion, MirrorStore, NewVersion};
use crate::types::{RepositoryId, Sha};

use super::diff::line_stats;

/// One file's content as observed at a commit.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    pub path: String,
    pub content: String,
}

/// Creates and queries immutable code version snapshots.
pub struct VersionEngine {
    store: Arc<MirrorStore>,
}

impl VersionEngine {
    pub fn new(store: Arc<MirrorStore>) -> Self {
        VersionEngine { store }
    }

    /// Records one version per snapshot for the given commit.
    ///
    /// Returns the number of versions created; zero when the commit was
    /// already processed. Change statistics are computed against the latest
    /// active version of each path, which also becomes the new version's
    /// parent.
    pub fn process_commit(
        &self,
        repository: RepositoryId,
        commit_sha: &Sha,
        branch: &str,
        author: &str,
        snapshots: Vec<FileSnapshot>,
    ) -> usize {
        if self.store.has_versions_for_commit(repository, commit_sha) {
            debug!(%commit_sha, "commit already versioned, skipping");
            return 0;
        }
        if snapshots.is_empty() {
            return 0;
        }

        let mut created = 0;
        for snapshot in snapshots {
            let previous = self.store.latest_active_version(repository, &snapshot.path);
            let stats = line_stats(
                previous.as_ref().map(|v| v.content.as_str()),
                &snapshot.content,
            );
            self.store.append_version(NewVersion {
                repository,
                path: snapshot.path,
                commit_sha: commit_sha.clone(),
                branch: branch.to_string(),
                content: snapshot.content,
                author: author.to_string(),
                parent: previous.map(|v| v.id),
                stats,
            });
            created += 1;
        }
        info!(%commit_sha, created, "recorded code versions");
        created
    }

    /// The latest active version of a path, i.e. its current state.
    pub fn current_state(&self, repository: RepositoryId, path: &str) -> Option<CodeVersion> {
        self.store.latest_active_version(repository, path)
    }

    /// Full version history of a path, oldest first. Includes archived rows.
    pub fn file_history(&self, repository: RepositoryId, path: &str) -> Vec<CodeVersion> {
        self.store.versions_for_path(repository, path)
    }

    /// Archives active versions created before the cutoff. Archived versions
    /// stay readable; only their status changes.
    pub fn archive_old_versions(&self, repository: RepositoryId, before: DateTime<Utc>) -> usize {
        let archived = self.store.archive_versions_before(repository, before);
        if archived > 0 {
            info!(archived, "archived old code versions");
        }
        archived
    }
}
