//! Event routing.
//!
//! Maps an event-type tag to exactly one handler. The router is a registered
//! map from tag to handler function; tags without a registered handler fall
//! through to a no-op that logs at info level and never errors.
//!
//! Handlers are pure: they take the typed event and return a [`RouteOutcome`]
//! describing the side effects the ingress should attempt: an activity
//! summary for notification fan-out, code-insight requests for the push
//! enrichment path, and whether the mirror should be reconciled. The ingress
//! executes each of those best-effort and in isolation; nothing a handler
//! returns can fail a delivery by itself.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::languages::language_for_path;
use crate::types::RepoFullName;

use super::events::{GitHubEvent, PushEvent};

/// A human-readable summary of repository activity, handed to the
/// notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub repo: RepoFullName,
    pub branch: Option<String>,
    pub actor: String,
    pub description: String,
}

/// A request for the code-insight collaborator: one modified source file from
/// a push, with a language guess and the commit message for context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightRequest {
    pub repo: RepoFullName,
    pub path: String,
    pub language: String,
    pub commit_message: String,
}

/// What the ingress should do after routing one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Activity to fan out to project members, if the event is notifiable.
    pub activity: Option<Activity>,

    /// Push enrichment requests, one per recognized modified source file.
    pub insights: Vec<InsightRequest>,

    /// Whether this event indicates the mirror may be stale.
    pub wants_sync: bool,
}

type Handler = fn(&GitHubEvent) -> RouteOutcome;

/// The event router: a tag-to-handler registry with a logging no-op default.
pub struct EventRouter {
    handlers: HashMap<&'static str, Handler>,
}

impl EventRouter {
    /// Builds a router with all recognized event types registered.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Handler> = HashMap::new();
        handlers.insert("push", handle_push);
        handlers.insert("pull_request", handle_pull_request);
        handlers.insert("issues", handle_issues);
        handlers.insert("create", handle_created_ref);
        handlers.insert("delete", handle_deleted_ref);
        handlers.insert("release", handle_release);
        handlers.insert("fork", handle_fork);
        handlers.insert("watch", handle_watch);
        EventRouter { handlers }
    }

    /// Dispatches an event to its handler.
    ///
    /// An event whose tag has no registered handler (possible when the parser
    /// recognizes more tags than the router) is logged and produces an empty
    /// outcome.
    pub fn route(&self, event: &GitHubEvent) -> RouteOutcome {
        match self.handlers.get(event.event_name()) {
            Some(handler) => handler(event),
            None => {
                info!(
                    event = event.event_name(),
                    repo = %event.repo(),
                    "no handler registered for event type, ignoring"
                );
                RouteOutcome::default()
            }
        }
    }

    /// Logs and drops an event-type tag the parser did not recognize.
    ///
    /// Kept on the router so that "unknown tag" handling lives next to the
    /// registry it falls outside of.
    pub fn note_unhandled(&self, event_type: &str, repo: Option<&str>) {
        info!(
            event = event_type,
            repo = repo.unwrap_or("unknown"),
            "unhandled event type, ignoring"
        );
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_push(event: &GitHubEvent) -> RouteOutcome {
    let GitHubEvent::Push(push) = event else {
        return RouteOutcome::default();
    };

    let description = match push.commits.len() {
        0 => format!("pushed to {}", push.ref_name),
        1 => format!(
            "pushed 1 commit to {}: {}",
            push.ref_name,
            first_line(&push.commits[0].message)
        ),
        n => format!("pushed {n} commits to {}", push.ref_name),
    };

    RouteOutcome {
        activity: Some(Activity {
            repo: push.repo.clone(),
            branch: push.branch().map(str::to_string),
            actor: push.pusher.clone(),
            description,
        }),
        insights: insight_requests(push),
        wants_sync: true,
    }
}

/// Builds one insight request per modified source file in the push.
///
/// Only files marked "modified" with a recognized source extension qualify;
/// added and removed files have no previous version worth commenting on.
fn insight_requests(push: &PushEvent) -> Vec<InsightRequest> {
    let mut requests = Vec::new();
    for commit in &push.commits {
        for path in &commit.modified {
            if let Some(language) = language_for_path(path) {
                requests.push(InsightRequest {
                    repo: push.repo.clone(),
                    path: path.clone(),
                    language: language.to_string(),
                    commit_message: commit.message.clone(),
                });
            }
        }
    }
    requests
}

fn handle_pull_request(event: &GitHubEvent) -> RouteOutcome {
    let GitHubEvent::PullRequest(pr) = event else {
        return RouteOutcome::default();
    };

    let verb = if pr.action == "closed" && pr.merged {
        "merged"
    } else {
        pr.action.as_str()
    };

    RouteOutcome {
        activity: Some(Activity {
            repo: pr.repo.clone(),
            branch: Some(pr.base_branch.clone()),
            actor: pr.actor.clone(),
            description: format!("{verb} pull request #{}: {}", pr.number, pr.title),
        }),
        insights: Vec::new(),
        // A merged PR lands commits on the base branch.
        wants_sync: pr.merged,
    }
}

fn handle_issues(event: &GitHubEvent) -> RouteOutcome {
    let GitHubEvent::Issues(issue) = event else {
        return RouteOutcome::default();
    };

    RouteOutcome {
        activity: Some(Activity {
            repo: issue.repo.clone(),
            branch: None,
            actor: issue.actor.clone(),
            description: format!("{} issue #{}: {}", issue.action, issue.number, issue.title),
        }),
        insights: Vec::new(),
        wants_sync: false,
    }
}

fn handle_created_ref(event: &GitHubEvent) -> RouteOutcome {
    let GitHubEvent::Create(e) = event else {
        return RouteOutcome::default();
    };

    RouteOutcome {
        activity: Some(Activity {
            repo: e.repo.clone(),
            branch: (e.ref_type == "branch").then(|| e.ref_name.clone()),
            actor: e.actor.clone(),
            description: format!("created {} {}", e.ref_type, e.ref_name),
        }),
        insights: Vec::new(),
        wants_sync: e.ref_type == "branch",
    }
}

fn handle_deleted_ref(event: &GitHubEvent) -> RouteOutcome {
    let GitHubEvent::Delete(e) = event else {
        return RouteOutcome::default();
    };

    RouteOutcome {
        activity: Some(Activity {
            repo: e.repo.clone(),
            branch: (e.ref_type == "branch").then(|| e.ref_name.clone()),
            actor: e.actor.clone(),
            description: format!("deleted {} {}", e.ref_type, e.ref_name),
        }),
        insights: Vec::new(),
        wants_sync: e.ref_type == "branch",
    }
}

fn handle_release(event: &GitHubEvent) -> RouteOutcome {
    let GitHubEvent::Release(e) = event else {
        return RouteOutcome::default();
    };

    let name = e.name.clone().unwrap_or_else(|| e.tag.clone());
    RouteOutcome {
        activity: Some(Activity {
            repo: e.repo.clone(),
            branch: None,
            actor: e.actor.clone(),
            description: format!("{} release {name} ({})", e.action, e.tag),
        }),
        insights: Vec::new(),
        wants_sync: false,
    }
}

fn handle_fork(event: &GitHubEvent) -> RouteOutcome {
    let GitHubEvent::Fork(e) = event else {
        return RouteOutcome::default();
    };

    RouteOutcome {
        activity: Some(Activity {
            repo: e.repo.clone(),
            branch: None,
            actor: e.actor.clone(),
            description: format!("forked the repository to {}", e.fork_full_name),
        }),
        insights: Vec::new(),
        wants_sync: false,
    }
}

fn handle_watch(event: &GitHubEvent) -> RouteOutcome {
    let GitHubEvent::Watch(e) = event else {
        return RouteOutcome::default();
    };

    RouteOutcome {
        activity: Some(Activity {
            repo: e.repo.clone(),
            branch: None,
            actor: e.actor.clone(),
            description: "starred the repository".to_string(),
        }),
        insights: Vec::new(),
        wants_sync: false,
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}
