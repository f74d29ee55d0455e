//! Collaborator seams for notification fan-out and push enrichment.
//!
//! The surrounding platform owns recipient resolution (group/project
//! membership), notification delivery (email/chat), and the AI text analysis
//! that comments on pushed code. This module defines the trait boundaries and
//! logging default implementations; the real implementations live outside
//! this service.
//!
//! Every call through these traits is best-effort: callers log failures and
//! discard them. Nothing here may fail a webhook delivery or a sync.

use thiserror::Error;
use tracing::{debug, info};

use crate::types::{RepoFullName, UserId};
use crate::webhooks::{Activity, InsightRequest};

/// Error from the notification collaborator.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Error from the code-insight collaborator.
#[derive(Debug, Error)]
#[error("insight analysis failed: {0}")]
pub struct InsightError(pub String);

/// Maps a repository to the internal users who should hear about activity on
/// it, via group and project membership.
pub trait RecipientResolver: Send + Sync {
    fn recipients_for(&self, repo: &RepoFullName) -> Vec<UserId>;
}

/// Delivers an activity summary to a set of users.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, activity: &Activity, recipients: &[UserId]) -> Result<(), NotifyError>;
}

/// Forwards a modified source file to the external text-analysis service.
pub trait InsightClient: Send + Sync {
    fn analyze(&self, request: &InsightRequest) -> Result<(), InsightError>;
}

/// Resolver that knows no memberships; resolves every repository to nobody.
#[derive(Debug, Default)]
pub struct EmptyResolver;

impl RecipientResolver for EmptyResolver {
    fn recipients_for(&self, repo: &RepoFullName) -> Vec<UserId> {
        debug!(repo = %repo, "no recipient resolver configured");
        Vec::new()
    }
}

/// Sink that logs activities instead of delivering them.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn deliver(&self, activity: &Activity, recipients: &[UserId]) -> Result<(), NotifyError> {
        info!(
            repo = %activity.repo,
            actor = %activity.actor,
            recipients = recipients.len(),
            "activity: {}",
            activity.description
        );
        Ok(())
    }
}

/// Insight client that logs requests instead of analyzing them.
#[derive(Debug, Default)]
pub struct LoggingInsightClient;

impl InsightClient for LoggingInsightClient {
    fn analyze(&self, request: &InsightRequest) -> Result<(), InsightError> {
        debug!(
            repo = %request.repo,
            path = %request.path,
            language = %request.language,
            "insight request"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_resolver_resolves_nobody() {
        let resolver = EmptyResolver;
        assert!(
            resolver
                .recipients_for(&RepoFullName::new("org/repo"))
                .is_empty()
        );
    }

    #[test]
    fn logging_sink_accepts_everything() {
        let sink = LoggingSink;
        let activity = Activity {
            repo: RepoFullName::new("org/repo"),
            branch: Some("main".to_string()),
            actor: "octocat".to_string(),
            description: "pushed 1 commit to refs/heads/main".to_string(),
        };
        assert!(sink.deliver(&activity, &[UserId(1), UserId(2)]).is_ok());
    }
}
