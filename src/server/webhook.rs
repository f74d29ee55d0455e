//! The webhook ingress endpoint.
//!
//! Response policy: 401 only for signature failures (before any side effect),
//! 400 for missing headers or malformed payloads of known event types, and
//! 200 for everything after the signature and routing gates: unknown event
//! types, collaborator failures, and sync failures are all absorbed so the
//! provider never retries a delivery the service has already acted on.
//!
//! Mirror reconciliation is spawned fire-and-forget; slow provider fetches
//! never delay the response.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::provider::Provider;
use crate::tracker::DeliveryKey;
use crate::types::{DeliveryId, HookId};
use crate::webhooks::{GitHubEvent, RouteOutcome, SignatureCheck, check_signature, parse_event};

use super::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub async fn handle<P: Provider + 'static>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(event_type) = header_str(&headers, "x-github-event") else {
        return bad_request("missing x-github-event header");
    };
    let Some(delivery) = header_str(&headers, "x-github-delivery").map(DeliveryId::new) else {
        return bad_request("missing x-github-delivery header");
    };
    let hook_id = header_str(&headers, "x-github-hook-id")
        .and_then(|v| v.parse().ok())
        .map(HookId);

    // Signature gate first: nothing below runs for a delivery that fails it.
    if let Some(secret) = &state.config.webhook_secret {
        let signature = header_str(&headers, "x-hub-signature-256");
        let check = check_signature(
            &body,
            signature,
            secret.as_bytes(),
            state.config.require_signature,
        );
        if !check.accepted() {
            let reason = match check {
                SignatureCheck::MissingRequired => "missing signature",
                _ => "signature mismatch",
            };
            warn!(delivery = %delivery, event = event_type, reason, "delivery rejected");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": reason })),
            )
                .into_response();
        }
    }

    let event = match parse_event(event_type, &body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            // Delivered and verified; just nothing for us to do.
            state.router.note_unhandled(event_type, None);
            state.tracker.record_success(&DeliveryKey {
                hook_id,
                ..Default::default()
            });
            return accepted();
        }
        Err(err) => {
            warn!(delivery = %delivery, event = event_type, error = %err, "malformed payload");
            state
                .tracker
                .record_failure(
                    &DeliveryKey {
                        hook_id,
                        ..Default::default()
                    },
                    &err.to_string(),
                );
            return bad_request("malformed payload");
        }
    };

    info!(
        delivery = %delivery,
        event = event_type,
        repo = %event.repo(),
        actor = event.actor(),
        "delivery received"
    );
    state.tracker.record_success(&DeliveryKey {
        hook_id,
        remote_id: event.remote_id(),
        full_name: Some(event.repo().clone()),
    });

    let outcome = state.router.route(&event);
    run_side_effects(&state, &event, outcome);
    accepted()
}

/// Executes the routed side effects, each best-effort and isolated.
fn run_side_effects<P: Provider + 'static>(
    state: &AppState<P>,
    event: &GitHubEvent,
    outcome: RouteOutcome,
) {
    if let Some(activity) = outcome.activity {
        let recipients = state.resolver.recipients_for(&activity.repo);
        if let Err(err) = state.sink.deliver(&activity, &recipients) {
            warn!(repo = %activity.repo, error = %err, "notification delivery failed");
        }
    }

    for request in outcome.insights {
        if let Err(err) = state.insights.analyze(&request) {
            // One file's failure must not stop its siblings.
            warn!(path = %request.path, error = %err, "insight request failed");
        }
    }

    if outcome.wants_sync {
        let sync = state.sync.clone();
        let full_name = event.repo().clone();
        tokio::spawn(async move {
            match sync.sync_by_full_name(&full_name).await {
                // Already recorded on the repository row; the delivery was
                // answered long before this resolves.
                Ok(report) => debug!(repo = %full_name, ?report, "webhook-triggered sync done"),
                Err(err) => debug!(repo = %full_name, error = %err, "webhook-triggered sync failed"),
            }
        });
    }
}

fn accepted() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
