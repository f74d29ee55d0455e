//! Subscription management endpoints.
//!
//! Subscribing mirrors a remote repository: the repository row is created (if
//! absent), a webhook is registered with the provider, and an initial sync is
//! spawned. Provider-side hook registration is best-effort: when it fails
//! the subscription is still created, in `Pending`, and a later re-register
//! can complete it. Unsubscription and deletion never remove subscription
//! rows; they transition status, keeping delivery history queryable.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::provider::{Provider, ProviderError};
use crate::store::{NewRepository, StoreError, WebhookSubscription};
use crate::types::{HookId, RepoFullName, RepositoryId, SubscriptionStatus, UserId};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Internal platform user linking the repository.
    pub user: u64,
}

/// JSON view of one subscription.
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub repository: RepositoryId,
    pub full_name: RepoFullName,
    pub status: SubscriptionStatus,
    pub hook_id: Option<HookId>,
    pub failure_count: u32,
    pub healthy: bool,
    pub last_delivery: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl From<WebhookSubscription> for SubscriptionView {
    fn from(sub: WebhookSubscription) -> Self {
        SubscriptionView {
            repository: sub.repository,
            full_name: sub.repo_full_name.clone(),
            status: sub.status,
            hook_id: sub.hook_id,
            failure_count: sub.failure_count,
            healthy: sub.is_healthy(),
            last_delivery: sub.last_delivery,
            last_error: sub.last_error,
        }
    }
}

/// Totals for the operator stats endpoint.
#[derive(Debug, Serialize)]
pub struct SubscriptionStats {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub inactive: usize,
    pub failed: usize,
    pub healthy: usize,
}

pub async fn subscribe<P: Provider + 'static>(
    State(state): State<AppState<P>>,
    Path((owner, repo)): Path<(String, String)>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Response, ApiError> {
    let full_name = RepoFullName::from_parts(&owner, &repo);

    if let Some(existing) = state
        .store
        .repository_by_full_name(&full_name)
        .and_then(|r| state.store.subscription(r.id))
    {
        if existing.status == SubscriptionStatus::Active {
            return Ok((StatusCode::OK, Json(SubscriptionView::from(existing))).into_response());
        }
    }

    let view = subscribe_repository(&state, &full_name, UserId(request.user)).await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

/// Mirrors and subscribes one repository. Shared by the single and bulk
/// subscribe endpoints.
async fn subscribe_repository<P: Provider + 'static>(
    state: &AppState<P>,
    full_name: &RepoFullName,
    user: UserId,
) -> Result<SubscriptionView, ApiError> {
    let remote = state
        .sync
        .provider()
        .fetch_repository(full_name)
        .await
        .map_err(|err| match err {
            ProviderError::NotFound(_) => {
                ApiError::NotFound(format!("remote repository not found: {full_name}"))
            }
            other => ApiError::Upstream(other.to_string()),
        })?;

    let repository = match state.store.create_repository(NewRepository {
        remote_id: Some(remote.remote_id),
        full_name: full_name.clone(),
        owner: user,
        private: remote.private,
        default_branch: remote.default_branch,
    }) {
        Ok(id) => id,
        Err(StoreError::DuplicateRepository(_)) => {
            // Already mirrored (e.g. resubscribing after unsubscribe).
            state
                .store
                .repository_by_full_name(full_name)
                .map(|r| r.id)
                .ok_or_else(|| ApiError::NotFound(format!("repository vanished: {full_name}")))?
        }
        Err(other) => return Err(ApiError::BadRequest(other.to_string())),
    };

    let hook_id = match state
        .sync
        .provider()
        .register_webhook(full_name, &state.config.callback_url)
        .await
    {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(repo = %full_name, error = %err, "webhook registration failed, subscription pending");
            None
        }
    };

    let subscription = WebhookSubscription {
        repository,
        repo_full_name: full_name.clone(),
        remote_id: Some(remote.remote_id),
        hook_id,
        status: if hook_id.is_some() {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Pending
        },
        failure_count: 0,
        last_delivery: None,
        last_error: None,
        created_at: Utc::now(),
    };
    state.store.upsert_subscription(subscription.clone());
    info!(repo = %full_name, hook = ?hook_id, "repository subscribed");

    let sync = state.sync.clone();
    let name = full_name.clone();
    tokio::spawn(async move {
        if let Err(err) = sync.sync_by_full_name(&name).await {
            warn!(repo = %name, error = %err, "initial sync failed");
        }
    });

    Ok(subscription.into())
}

pub async fn unsubscribe<P: Provider + 'static>(
    State(state): State<AppState<P>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let full_name = RepoFullName::from_parts(&owner, &repo);
    let (repository, subscription) = lookup(&state, &full_name)?;

    if let Some(hook) = subscription.hook_id {
        if let Err(err) = state.sync.provider().remove_webhook(&full_name, hook).await {
            // Local deactivation proceeds regardless; the provider-side hook
            // will fail deliveries into a dead subscription at worst.
            warn!(repo = %full_name, error = %err, "webhook removal failed");
        }
    }

    state.store.modify_subscription(repository, |sub| {
        sub.status = SubscriptionStatus::Inactive;
        sub.hook_id = None;
    });
    info!(repo = %full_name, "repository unsubscribed");

    let updated = state
        .store
        .subscription(repository)
        .ok_or_else(|| ApiError::NotFound(format!("no subscription for {full_name}")))?;
    Ok(Json(updated.into()))
}

/// Replaces the provider-side hook and resets delivery health. The only
/// operation that decreases `failure_count`.
pub async fn re_register<P: Provider + 'static>(
    State(state): State<AppState<P>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let full_name = RepoFullName::from_parts(&owner, &repo);
    let (repository, subscription) = lookup(&state, &full_name)?;

    if let Some(old_hook) = subscription.hook_id {
        if let Err(err) = state
            .sync
            .provider()
            .remove_webhook(&full_name, old_hook)
            .await
        {
            warn!(repo = %full_name, error = %err, "stale webhook removal failed");
        }
    }

    let hook = state
        .sync
        .provider()
        .register_webhook(&full_name, &state.config.callback_url)
        .await
        .map_err(|err| ApiError::Upstream(err.to_string()))?;

    state.store.modify_subscription(repository, |sub| {
        sub.hook_id = Some(hook);
        sub.status = SubscriptionStatus::Active;
        sub.failure_count = 0;
        sub.last_error = None;
    });
    info!(repo = %full_name, hook = %hook, "subscription re-registered");

    let updated = state
        .store
        .subscription(repository)
        .ok_or_else(|| ApiError::NotFound(format!("no subscription for {full_name}")))?;
    Ok(Json(updated.into()))
}

pub async fn status<P: Provider + 'static>(
    State(state): State<AppState<P>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let full_name = RepoFullName::from_parts(&owner, &repo);
    let (_, subscription) = lookup(&state, &full_name)?;
    Ok(Json(subscription.into()))
}

#[derive(Debug, Serialize)]
pub struct BulkSubscribeResult {
    pub subscribed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Subscribes every remote repository owned by the given provider login.
pub async fn subscribe_user<P: Provider + 'static>(
    State(state): State<AppState<P>>,
    Path(login): Path<String>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<BulkSubscribeResult>, ApiError> {
    let repositories = state
        .sync
        .provider()
        .list_user_repositories(&login)
        .await
        .map_err(|err| ApiError::Upstream(err.to_string()))?;

    let mut result = BulkSubscribeResult {
        subscribed: 0,
        skipped: 0,
        failed: 0,
    };
    for remote in repositories {
        let already_active = state
            .store
            .repository_by_full_name(&remote.full_name)
            .and_then(|r| state.store.subscription(r.id))
            .is_some_and(|s| s.status == SubscriptionStatus::Active);
        if already_active {
            result.skipped += 1;
            continue;
        }
        match subscribe_repository(&state, &remote.full_name, UserId(request.user)).await {
            Ok(_) => result.subscribed += 1,
            Err(err) => {
                warn!(repo = %remote.full_name, error = %err, "bulk subscribe: repository failed");
                result.failed += 1;
            }
        }
    }
    Ok(Json(result))
}

pub async fn stats<P: Provider + 'static>(
    State(state): State<AppState<P>>,
) -> Json<SubscriptionStats> {
    let subscriptions = state.store.all_subscriptions();
    let count = |status: SubscriptionStatus| {
        subscriptions.iter().filter(|s| s.status == status).count()
    };
    Json(SubscriptionStats {
        total: subscriptions.len(),
        active: count(SubscriptionStatus::Active),
        pending: count(SubscriptionStatus::Pending),
        inactive: count(SubscriptionStatus::Inactive),
        failed: count(SubscriptionStatus::Failed),
        healthy: subscriptions.iter().filter(|s| s.is_healthy()).count(),
    })
}

fn lookup<P>(
    state: &AppState<P>,
    full_name: &RepoFullName,
) -> Result<(RepositoryId, WebhookSubscription), ApiError> {
    let repo = state
        .store
        .repository_by_full_name(full_name)
        .ok_or_else(|| ApiError::NotFound(format!("repository not mirrored: {full_name}")))?;
    let subscription = state
        .store
        .subscription(repo.id)
        .ok_or_else(|| ApiError::NotFound(format!("no subscription for {full_name}")))?;
    Ok((repo.id, subscription))
}
