//! Read-side aggregation over the mirror store.
//!
//! Computed on demand from the row maps; nothing here is cached or
//! denormalized, so the numbers always reflect the store's current state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::languages::language_for_path;
use crate::store::MirrorStore;
use crate::types::{RepoFullName, RepositoryId, SubscriptionStatus, SyncStatus};

/// Aggregate statistics for one mirrored repository.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStatistics {
    pub repository: RepositoryId,
    pub full_name: RepoFullName,
    pub sync_status: SyncStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub branch_count: usize,
    pub commit_count: usize,
    pub file_count: usize,
    /// Active collaborators only.
    pub collaborator_count: usize,
    pub active_version_count: usize,
    /// Diff totals summed over all stored commits.
    pub total_additions: u64,
    pub total_deletions: u64,
    /// Current files per recognized language, across all branches.
    pub languages: BTreeMap<String, usize>,
}

/// Service-wide totals for the operator stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatistics {
    pub repositories: usize,
    pub repositories_by_status: BTreeMap<String, usize>,
    pub commits: usize,
    pub active_versions: usize,
    pub subscriptions: usize,
    pub healthy_subscriptions: usize,
    pub failed_subscriptions: usize,
}

/// Read-side views computed from the mirror store.
pub struct ReadAggregator {
    store: Arc<MirrorStore>,
}

impl ReadAggregator {
    pub fn new(store: Arc<MirrorStore>) -> Self {
        ReadAggregator { store }
    }

    /// Statistics for one repository, or `None` when it is not mirrored.
    pub fn repository_statistics(&self, repository: RepositoryId) -> Option<RepositoryStatistics> {
        let repo = self.store.repository(repository)?;

        let commits = self.store.commits_for_repository(repository);
        let files = self.store.files_for_repository(repository, None);
        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        for file in &files {
            if let Some(language) = language_for_path(&file.path) {
                *languages.entry(language.to_string()).or_default() += 1;
            }
        }

        Some(RepositoryStatistics {
            repository,
            full_name: repo.full_name,
            sync_status: repo.sync_status,
            last_synced_at: repo.last_synced_at,
            branch_count: self.store.branches(repository).len(),
            commit_count: commits.len(),
            file_count: files.len(),
            collaborator_count: self
                .store
                .collaborators(repository)
                .iter()
                .filter(|c| c.active)
                .count(),
            active_version_count: self.store.active_versions(repository).len(),
            total_additions: commits.iter().map(|c| c.additions).sum(),
            total_deletions: commits.iter().map(|c| c.deletions).sum(),
            languages,
        })
    }

    /// Totals across the whole mirror.
    pub fn service_statistics(&self) -> ServiceStatistics {
        let repositories = self.store.repositories();
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut commits = 0;
        let mut active_versions = 0;
        for repo in &repositories {
            *by_status.entry(repo.sync_status.to_string()).or_default() += 1;
            commits += self.store.commits_for_repository(repo.id).len();
            active_versions += self.store.active_versions(repo.id).len();
        }

        let subscriptions = self.store.all_subscriptions();
        ServiceStatistics {
            repositories: repositories.len(),
            repositories_by_status: by_status,
            commits,
            active_versions,
            subscriptions: subscriptions.len(),
            healthy_subscriptions: subscriptions.iter().filter(|s| s.is_healthy()).count(),
            failed_subscriptions: subscriptions
                .iter()
                .filter(|s| s.status == SubscriptionStatus::Failed)
                .count(),
        }
    }
}
