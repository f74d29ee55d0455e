//! HTTP surface: webhook ingress, subscription management, and the read API.

pub mod reads;
pub mod subscriptions;
pub mod webhook;

use std::ops::Deref;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::aggregate::ReadAggregator;
use crate::config::Config;
use crate::notify::{InsightClient, NotificationSink, RecipientResolver};
use crate::provider::Provider;
use crate::store::MirrorStore;
use crate::sync::{BulkResync, SyncEngine};
use crate::tracker::DeliveryTracker;
use crate::types::UserId;
use crate::versions::VersionEngine;
use crate::webhooks::EventRouter;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppStateInner<P> {
    pub store: Arc<MirrorStore>,
    pub tracker: DeliveryTracker,
    pub sync: Arc<SyncEngine<P>>,
    pub versions: VersionEngine,
    pub aggregator: ReadAggregator,
    pub router: EventRouter,
    pub resolver: Arc<dyn RecipientResolver>,
    pub sink: Arc<dyn NotificationSink>,
    pub insights: Arc<dyn InsightClient>,
    pub bulk: BulkResync,
    pub config: Config,
}

/// Cloneable handle to the shared state.
pub struct AppState<P> {
    inner: Arc<AppStateInner<P>>,
}

impl<P> AppState<P> {
    pub fn new(inner: AppStateInner<P>) -> Self {
        AppState {
            inner: Arc::new(inner),
        }
    }
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        AppState {
            inner: self.inner.clone(),
        }
    }
}

impl<P> Deref for AppState<P> {
    type Target = AppStateInner<P>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Errors the API surface returns as JSON bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// The remote provider rejected or failed a call the operation needed.
    #[error("{0}")]
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Builds the full application router.
pub fn build_router<P: Provider + 'static>(state: AppState<P>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook::handle::<P>))
        .route(
            "/api/v1/repos/{owner}/{repo}/subscription",
            post(subscriptions::subscribe::<P>)
                .get(subscriptions::status::<P>)
                .delete(subscriptions::unsubscribe::<P>),
        )
        .route(
            "/api/v1/repos/{owner}/{repo}/subscription/re-register",
            post(subscriptions::re_register::<P>),
        )
        .route(
            "/api/v1/users/{user}/subscriptions",
            post(subscriptions::subscribe_user::<P>),
        )
        .route(
            "/api/v1/subscriptions/stats",
            get(subscriptions::stats::<P>),
        )
        .route("/api/v1/repositories", get(reads::list_repositories::<P>))
        .route(
            "/api/v1/repositories/{id}",
            get(reads::repository::<P>).delete(reads::delete_repository::<P>),
        )
        .route(
            "/api/v1/repositories/{id}/files",
            get(reads::repository_files::<P>),
        )
        .route(
            "/api/v1/repositories/{id}/commits",
            get(reads::repository_commits::<P>),
        )
        .route(
            "/api/v1/repositories/{id}/statistics",
            get(reads::repository_statistics::<P>),
        )
        .route(
            "/api/v1/repositories/{id}/versions",
            get(reads::version_history::<P>),
        )
        .route(
            "/api/v1/repositories/{id}/versions/current",
            get(reads::current_versions::<P>),
        )
        .route("/api/v1/statistics", get(service_statistics::<P>))
        .route("/api/v1/files/{id}/content", get(reads::file_content::<P>))
        .route("/api/v1/commits/{id}", get(reads::commit::<P>))
        .route(
            "/api/v1/sync/bulk",
            post(trigger_bulk::<P>).get(bulk_status::<P>),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn service_statistics<P: Provider>(
    State(state): State<AppState<P>>,
) -> Json<crate::aggregate::ServiceStatistics> {
    Json(state.aggregator.service_statistics())
}

/// Optional scope for a bulk run. An absent body (or empty list) resyncs
/// every mirrored repository.
#[derive(Debug, Deserialize)]
struct BulkTriggerRequest {
    #[serde(default)]
    users: Vec<u64>,
}

async fn trigger_bulk<P: Provider>(
    State(state): State<AppState<P>>,
    body: Option<Json<BulkTriggerRequest>>,
) -> Response {
    let users = body.and_then(|Json(request)| {
        if request.users.is_empty() {
            None
        } else {
            Some(request.users.into_iter().map(UserId).collect())
        }
    });
    if state.bulk.trigger(users) {
        (StatusCode::ACCEPTED, Json(json!({ "enqueued": true }))).into_response()
    } else {
        (StatusCode::CONFLICT, Json(json!({ "enqueued": false }))).into_response()
    }
}

async fn bulk_status<P: Provider>(State(state): State<AppState<P>>) -> Response {
    Json(state.bulk.state()).into_response()
}
