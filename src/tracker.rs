//! Per-repository webhook delivery tracking.
//!
//! The tracker records delivery health on [`WebhookSubscription`] rows. It is
//! best-effort telemetry: a delivery whose subscription cannot be found is
//! logged and dropped, never an error, so tracking can never block event
//! processing.
//!
//! Subscription lookup tries the provider's hook id first (the most precise
//! key), then falls back to repository identity (remote id or full name) for
//! deliveries that omit the hook header.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::store::{MirrorStore, WebhookSubscription};
use crate::types::{HookId, RemoteId, RepoFullName, SubscriptionStatus};

/// Keys available to locate the subscription a delivery belongs to.
#[derive(Debug, Clone, Default)]
pub struct DeliveryKey {
    pub hook_id: Option<HookId>,
    pub remote_id: Option<RemoteId>,
    pub full_name: Option<RepoFullName>,
}

impl DeliveryKey {
    pub fn for_repo(full_name: RepoFullName) -> Self {
        DeliveryKey {
            full_name: Some(full_name),
            ..Default::default()
        }
    }
}

/// Records webhook delivery outcomes against subscription rows.
pub struct DeliveryTracker {
    store: Arc<MirrorStore>,
    /// Consecutive-failure count at which a subscription's status is
    /// transitioned to `Failed`. Operator-configurable.
    failure_threshold: u32,
}

impl DeliveryTracker {
    pub fn new(store: Arc<MirrorStore>, failure_threshold: u32) -> Self {
        DeliveryTracker {
            store,
            failure_threshold,
        }
    }

    /// Records a successful delivery: stamps `last_delivery`, clears
    /// `last_error`. `failure_count` is deliberately left alone; only an
    /// explicit re-registration resets it.
    pub fn record_success(&self, key: &DeliveryKey) {
        let Some(sub) = self.find(key) else {
            debug!(?key, "delivery success for unknown subscription, ignoring");
            return;
        };
        self.store.modify_subscription(sub.repository, |sub| {
            sub.last_delivery = Some(Utc::now());
            sub.last_error = None;
        });
    }

    /// Records a failed delivery: increments `failure_count`, stores the
    /// error, and transitions the subscription to `Failed` once the count
    /// reaches the operator threshold.
    pub fn record_failure(&self, key: &DeliveryKey, error: &str) {
        let Some(sub) = self.find(key) else {
            debug!(?key, "delivery failure for unknown subscription, ignoring");
            return;
        };
        let threshold = self.failure_threshold;
        self.store.modify_subscription(sub.repository, |sub| {
            sub.failure_count += 1;
            sub.last_error = Some(error.to_string());
            if sub.failure_count >= threshold && sub.status != SubscriptionStatus::Failed {
                warn!(
                    repo = %sub.repo_full_name,
                    failures = sub.failure_count,
                    "subscription crossed failure threshold"
                );
                sub.status = SubscriptionStatus::Failed;
            }
        });
    }

    fn find(&self, key: &DeliveryKey) -> Option<WebhookSubscription> {
        if let Some(hook_id) = key.hook_id {
            if let Some(sub) = self.store.subscription_by_hook(hook_id) {
                return Some(sub);
            }
        }
        self.store
            .subscription_by_identity(key.remote_id, key.full_name.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewRepository;
    use crate::types::{RepositoryId, UserId};

    fn setup() -> (Arc<MirrorStore>, DeliveryTracker, RepositoryId) {
        let store = Arc::new(MirrorStore::new());
        let repo = store
            .create_repository(NewRepository {
                remote_id: Some(RemoteId(99)),
                full_name: RepoFullName::new("org/repo"),
                owner: UserId(1),
                private: false,
                default_branch: "main".to_string(),
            })
            .unwrap();
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
        let tracker = DeliveryTracker::new(store.clone(), 5);
        (store, tracker, repo)
    }

    #[test]
    fn success_stamps_delivery_and_clears_error() {
        let (store, tracker, repo) = setup();
        store.modify_subscription(repo, |s| s.last_error = Some("old".to_string()));

        tracker.record_success(&DeliveryKey {
            hook_id: Some(HookId(42)),
            ..Default::default()
        });

        let sub = store.subscription(repo).unwrap();
        assert!(sub.last_delivery.is_some());
        assert!(sub.last_error.is_none());
        assert_eq!(sub.failure_count, 0);
    }

    #[test]
    fn success_does_not_reset_failure_count() {
        let (store, tracker, repo) = setup();
        let key = DeliveryKey::for_repo(RepoFullName::new("org/repo"));

        for _ in 0..3 {
            tracker.record_failure(&key, "timeout");
        }
        tracker.record_success(&key);

        assert_eq!(store.subscription(repo).unwrap().failure_count, 3);
    }

    #[test]
    fn failure_threshold_transitions_to_failed() {
        let (store, tracker, repo) = setup();
        let key = DeliveryKey::for_repo(RepoFullName::new("org/repo"));

        for _ in 0..4 {
            tracker.record_failure(&key, "boom");
        }
        let sub = store.subscription(repo).unwrap();
        assert_eq!(sub.failure_count, 4);
        assert!(sub.is_healthy());
        assert_eq!(sub.status, SubscriptionStatus::Active);

        tracker.record_failure(&key, "boom");
        let sub = store.subscription(repo).unwrap();
        assert_eq!(sub.failure_count, 5);
        assert!(!sub.is_healthy());
        assert_eq!(sub.status, SubscriptionStatus::Failed);
    }

    #[test]
    fn hook_id_preferred_over_identity() {
        let (store, tracker, repo) = setup();

        // Key carries a bogus full name but a valid hook id; hook id wins.
        tracker.record_success(&DeliveryKey {
            hook_id: Some(HookId(42)),
            full_name: Some(RepoFullName::new("other/repo")),
            ..Default::default()
        });

        assert!(store.subscription(repo).unwrap().last_delivery.is_some());
    }

    #[test]
    fn falls_back_to_remote_id() {
        let (store, tracker, repo) = setup();

        tracker.record_success(&DeliveryKey {
            hook_id: Some(HookId(7)), // no such hook
            remote_id: Some(RemoteId(99)),
            full_name: None,
        });

        assert!(store.subscription(repo).unwrap().last_delivery.is_some());
    }

    #[test]
    fn unknown_subscription_is_swallowed() {
        let (store, tracker, repo) = setup();

        tracker.record_failure(
            &DeliveryKey::for_repo(RepoFullName::new("nobody/nothing")),
            "err",
        );

        // Nothing changed, nothing panicked.
        assert_eq!(store.subscription(repo).unwrap().failure_count, 0);
    }
}
