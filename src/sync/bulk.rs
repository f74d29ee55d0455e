//! Background bulk resynchronization.
//!
//! One worker task owns all bulk runs. Triggers are messages on a capacity-1
//! channel, so at most one run is in flight and at most one more is queued;
//! further triggers while busy are rejected rather than stacked. A run walks
//! every mirrored repository grouped by owner, sequentially, with a pause
//! between owners to spread provider load. An owner with any repository
//! synced within the staleness window is skipped wholesale. A trigger may
//! name specific owners to scope the run. Per-repository failures are counted
//! and the run continues.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provider::Provider;
use crate::store::Repository;
use crate::types::UserId;

use super::engine::SyncEngine;

/// Tuning knobs for bulk runs.
#[derive(Debug, Clone, Copy)]
pub struct BulkOptions {
    /// Repositories synced more recently than this are skipped.
    pub staleness_window: Duration,

    /// Pause between one owner's repositories and the next's.
    pub inter_user_delay: Duration,
}

impl Default for BulkOptions {
    fn default() -> Self {
        BulkOptions {
            staleness_window: Duration::from_secs(24 * 60 * 60),
            inter_user_delay: Duration::from_secs(1),
        }
    }
}

/// Where the worker currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BulkState {
    /// No run yet since startup.
    Idle,
    /// A run is in flight.
    Running {
        started_at: DateTime<Utc>,
        total: usize,
        completed: usize,
    },
    /// The most recent run finished.
    Completed(BulkSummary),
}

/// Outcome of one finished bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Handle to the bulk resync worker.
pub struct BulkResync {
    tx: mpsc::Sender<Option<Vec<UserId>>>,
    state: Arc<Mutex<BulkState>>,
}

impl BulkResync {
    /// Spawns the worker task and returns its handle. The task runs until the
    /// cancellation token fires or the handle is dropped.
    pub fn spawn<P: Provider + 'static>(
        engine: Arc<SyncEngine<P>>,
        options: BulkOptions,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel(1);
        let state = Arc::new(Mutex::new(BulkState::Idle));
        let worker_state = state.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("bulk resync worker shutting down");
                        break;
                    }
                    request = rx.recv() => {
                        let Some(scope) = request else {
                            break;
                        };
                        run(&engine, options, &worker_state, &cancel, scope).await;
                    }
                }
            }
        });

        BulkResync { tx, state }
    }

    /// Requests a bulk run, optionally scoped to the given owners. Returns
    /// false when a run is already in flight (or queued), or the worker is
    /// gone.
    pub fn trigger(&self, users: Option<Vec<UserId>>) -> bool {
        if matches!(*self.lock_state(), BulkState::Running { .. }) {
            return false;
        }
        self.tx.try_send(users).is_ok()
    }

    pub fn state(&self) -> BulkState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BulkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn update_progress(state: &Mutex<BulkState>, completed: usize) {
    if let BulkState::Running {
        completed: progress,
        ..
    } = &mut *state.lock().unwrap_or_else(|e| e.into_inner())
    {
        *progress = completed;
    }
}

fn is_stale(repo: &Repository, window: Duration, now: DateTime<Utc>) -> bool {
    match repo.last_synced_at {
        Some(synced_at) => {
            let age = now.signed_duration_since(synced_at);
            age >= chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX)
        }
        None => true,
    }
}

async fn run<P: Provider>(
    engine: &SyncEngine<P>,
    options: BulkOptions,
    state: &Mutex<BulkState>,
    cancel: &CancellationToken,
    scope: Option<Vec<UserId>>,
) {
    let mut repositories = engine.store().repositories();
    if let Some(users) = &scope {
        repositories.retain(|repo| users.contains(&repo.owner));
    }
    let total = repositories.len();
    info!(total, "bulk resync started");
    *state.lock().unwrap_or_else(|e| e.into_inner()) = BulkState::Running {
        started_at: Utc::now(),
        total,
        completed: 0,
    };

    let mut by_owner: BTreeMap<UserId, Vec<Repository>> = BTreeMap::new();
    for repo in repositories {
        by_owner.entry(repo.owner).or_default().push(repo);
    }

    let mut synced = 0;
    let mut skipped = 0;
    let mut failed = 0;
    let mut completed = 0;
    let mut first_owner = true;

    'owners: for (owner, repos) in by_owner {
        // One recent sync marks the whole owner as fresh.
        let now = Utc::now();
        if !repos
            .iter()
            .all(|repo| is_stale(repo, options.staleness_window, now))
        {
            debug!(%owner, repos = repos.len(), "owner recently synced, skipping");
            skipped += repos.len();
            completed += repos.len();
            update_progress(state, completed);
            continue;
        }

        if !first_owner {
            tokio::select! {
                _ = cancel.cancelled() => break 'owners,
                _ = tokio::time::sleep(options.inter_user_delay) => {}
            }
        }
        first_owner = false;
        debug!(%owner, repos = repos.len(), "bulk resync: next owner");

        for repo in repos {
            if cancel.is_cancelled() {
                break 'owners;
            }
            match engine.sync_repository(repo.id).await {
                Ok(_) => synced += 1,
                Err(err) => {
                    // Already recorded on the repository row.
                    warn!(repo = %repo.full_name, error = %err, "bulk resync: repository failed");
                    failed += 1;
                }
            }
            completed += 1;
            update_progress(state, completed);
        }
    }

    let summary = BulkSummary {
        finished_at: Utc::now(),
        total,
        synced,
        skipped,
        failed,
    };
    info!(synced, skipped, failed, "bulk resync finished");
    *state.lock().unwrap_or_else(|e| e.into_inner()) = BulkState::Completed(summary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RetryConfig;
    use crate::store::{MirrorStore, NewRepository};
    use crate::sync::engine::SyncOptions;
    use crate::test_utils::{MockProvider, commit_summary, commit_detail, remote_branch, remote_repository};
    use crate::types::{RemoteId, RepoFullName, RepositoryId};

    fn engine_with_repos(
        names: &[(&str, u64)],
    ) -> (Arc<MirrorStore>, Arc<MockProvider>, Arc<SyncEngine<MockProvider>>, Vec<RepositoryId>) {
        let store = Arc::new(MirrorStore::new());
        let provider = Arc::new(MockProvider::new());
        let mut ids = Vec::new();
        for (i, (name, owner)) in names.iter().enumerate() {
            let id = store
                .create_repository(NewRepository {
                    remote_id: Some(RemoteId(i as u64 + 1)),
                    full_name: RepoFullName::new(*name),
                    owner: UserId(*owner),
                    private: false,
                    default_branch: "main".to_string(),
                })
                .unwrap();
            ids.push(id);
            let full = RepoFullName::new(*name);
            provider.set_repository(remote_repository(i as u64 + 1, name, "main"));
            provider.set_branches(&full, vec![remote_branch("main", "aaa")]);
            provider.set_commits(&full, "main", vec![commit_summary("aaa", "first")]);
        }
        provider.set_commit_detail(commit_detail("aaa", "first", &[]));
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            provider.clone(),
            SyncOptions {
                commit_walk_limit: 100,
                retry: RetryConfig {
                    max_retries: 0,
                    ..RetryConfig::DEFAULT
                },
            },
        ));
        (store, provider, engine, ids)
    }

    async fn wait_for_summary(bulk: &BulkResync) -> BulkSummary {
        for _ in 0..1000 {
            if let BulkState::Completed(summary) = bulk.state() {
                return summary;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("bulk resync did not complete");
    }

    #[tokio::test(start_paused = true)]
    async fn run_syncs_every_stale_repository() {
        let (store, _, engine, ids) =
            engine_with_repos(&[("alice/one", 1), ("alice/two", 1), ("bob/three", 2)]);
        let bulk = BulkResync::spawn(engine, BulkOptions::default(), CancellationToken::new());

        assert!(bulk.trigger(None));
        let summary = wait_for_summary(&bulk).await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.synced, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);
        for id in ids {
            assert!(store.repository(id).unwrap().last_synced_at.is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_repository_skips_the_whole_owner() {
        let (store, _, engine, ids) =
            engine_with_repos(&[("alice/one", 1), ("alice/two", 1), ("bob/three", 2)]);
        // One fresh repo makes all of alice's repos fresh, including the
        // stale sibling.
        store.mark_sync_completed(ids[0], Utc::now());
        let bulk = BulkResync::spawn(engine, BulkOptions::default(), CancellationToken::new());

        assert!(bulk.trigger(None));
        let summary = wait_for_summary(&bulk).await;

        assert_eq!(summary.synced, 1);
        assert_eq!(summary.skipped, 2);
        assert!(store.repository(ids[1]).unwrap().last_synced_at.is_none());
        assert!(store.repository(ids[2]).unwrap().last_synced_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn scoped_trigger_limits_run_to_named_owners() {
        let (store, _, engine, ids) = engine_with_repos(&[("alice/one", 1), ("bob/two", 2)]);
        let bulk = BulkResync::spawn(engine, BulkOptions::default(), CancellationToken::new());

        assert!(bulk.trigger(Some(vec![UserId(1)])));
        let summary = wait_for_summary(&bulk).await;

        assert_eq!(summary.total, 1);
        assert_eq!(summary.synced, 1);
        assert!(store.repository(ids[0]).unwrap().last_synced_at.is_some());
        assert!(store.repository(ids[1]).unwrap().last_synced_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_counted_and_do_not_stop_the_run() {
        let (store, provider, engine, ids) = engine_with_repos(&[("alice/one", 1), ("bob/two", 2)]);
        provider.fail_with("connection reset");
        let bulk = BulkResync::spawn(engine, BulkOptions::default(), CancellationToken::new());

        assert!(bulk.trigger(None));
        let summary = wait_for_summary(&bulk).await;

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.synced, 0);
        for id in ids {
            assert_eq!(
                store.repository(id).unwrap().sync_status,
                crate::types::SyncStatus::Failed
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_worker_rejects_triggers() {
        let (_, _, engine, _) = engine_with_repos(&[("alice/one", 1)]);
        let cancel = CancellationToken::new();
        let bulk = BulkResync::spawn(engine, BulkOptions::default(), cancel.clone());

        cancel.cancel();
        // Let the worker observe the cancellation and drop its receiver.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;

        assert!(!bulk.trigger(None));
        assert_eq!(bulk.state(), BulkState::Idle);
    }

    #[test]
    fn staleness_check() {
        let now = Utc::now();
        let mut repo = Repository {
            id: RepositoryId(1),
            remote_id: None,
            full_name: RepoFullName::new("org/repo"),
            owner: UserId(1),
            private: false,
            default_branch: "main".to_string(),
            sync_status: crate::types::SyncStatus::Completed,
            sync_error: None,
            last_synced_at: None,
            created_at: now,
        };
        let window = Duration::from_secs(24 * 60 * 60);

        // Never synced: always stale.
        assert!(is_stale(&repo, window, now));

        repo.last_synced_at = Some(now - chrono::Duration::hours(1));
        assert!(!is_stale(&repo, window, now));

        repo.last_synced_at = Some(now - chrono::Duration::hours(25));
        assert!(is_stale(&repo, window, now));
    }
}
