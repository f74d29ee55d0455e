//! Webhook payload parser.
//!
//! Parses raw webhook JSON into typed [`GitHubEvent`] values. The event type
//! comes from the `X-GitHub-Event` header; the payload shape varies per type.
//!
//! Unknown event types return `Ok(None)`; the provider sends many event
//! kinds this service does not react to, and ignoring them must never fail a
//! delivery. Malformed payloads for known types return `Err`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{RemoteId, RepoFullName, Sha};

use super::events::{
    ForkEvent, GitHubEvent, IssuesEvent, PullRequestEvent, PushCommit, PushEvent, RefEvent,
    ReleaseEvent, WatchEvent,
};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses a webhook payload into a typed event.
///
/// * `Ok(Some(event))`: known event type, successfully parsed
/// * `Ok(None)`: unknown event type (ignored, not an error)
/// * `Err(_)`: malformed payload for a known event type
pub fn parse_event(event_type: &str, payload: &[u8]) -> Result<Option<GitHubEvent>, ParseError> {
    let event = match event_type {
        "push" => GitHubEvent::Push(parse_push(payload)?),
        "pull_request" => GitHubEvent::PullRequest(parse_pull_request(payload)?),
        "issues" => GitHubEvent::Issues(parse_issues(payload)?),
        "create" => GitHubEvent::Create(parse_ref_event(payload)?),
        "delete" => GitHubEvent::Delete(parse_ref_event(payload)?),
        "release" => GitHubEvent::Release(parse_release(payload)?),
        "fork" => GitHubEvent::Fork(parse_fork(payload)?),
        "watch" => GitHubEvent::Watch(parse_watch(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

// Raw deserialization structs mirror the provider's JSON. Optional fields are
// used liberally; required invariants are checked when building typed events.

#[derive(Debug, Deserialize)]
struct RawRepository {
    id: Option<u64>,
    full_name: String,
}

impl RawRepository {
    fn full_name(&self) -> RepoFullName {
        RepoFullName::new(&self.full_name)
    }

    fn remote_id(&self) -> Option<RemoteId> {
        self.id.map(RemoteId)
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawSender {
    sender: Option<RawUser>,
}

fn sender_login(payload: &[u8]) -> String {
    serde_json::from_slice::<RawSender>(payload)
        .ok()
        .and_then(|s| s.sender)
        .map(|u| u.login)
        .unwrap_or_else(|| "unknown".to_string())
}

// push

#[derive(Debug, Deserialize)]
struct RawPushPayload {
    #[serde(rename = "ref")]
    ref_name: String,
    before: String,
    after: String,
    repository: RawRepository,
    pusher: Option<RawPusher>,
    #[serde(default)]
    commits: Vec<RawPushCommit>,
}

#[derive(Debug, Deserialize)]
struct RawPusher {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawPushCommit {
    id: String,
    message: String,
    author: RawCommitAuthor,
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCommitAuthor {
    name: String,
    #[serde(default)]
    email: Option<String>,
}

fn parse_push(payload: &[u8]) -> Result<PushEvent, ParseError> {
    let raw: RawPushPayload = serde_json::from_slice(payload)?;

    let commits = raw
        .commits
        .into_iter()
        .map(|c| PushCommit {
            sha: Sha::new(c.id),
            message: c.message,
            author_name: c.author.name,
            author_email: c.author.email.unwrap_or_default(),
            timestamp: c.timestamp,
            added: c.added,
            modified: c.modified,
            removed: c.removed,
        })
        .collect();

    Ok(PushEvent {
        repo: raw.repository.full_name(),
        repo_remote_id: raw.repository.remote_id(),
        ref_name: raw.ref_name,
        before: Sha::new(raw.before),
        after: Sha::new(raw.after),
        pusher: raw
            .pusher
            .map(|p| p.name)
            .unwrap_or_else(|| sender_login(payload)),
        commits,
    })
}

// pull_request

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
    sender: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    title: Option<String>,
    merged: Option<bool>,
    base: RawRef,
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

fn parse_pull_request(payload: &[u8]) -> Result<PullRequestEvent, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    Ok(PullRequestEvent {
        repo: raw.repository.full_name(),
        repo_remote_id: raw.repository.remote_id(),
        action: raw.action,
        number: raw.pull_request.number,
        title: raw.pull_request.title.unwrap_or_default(),
        base_branch: raw.pull_request.base.ref_name,
        merged: raw.pull_request.merged.unwrap_or(false),
        actor: raw
            .sender
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

// issues

#[derive(Debug, Deserialize)]
struct RawIssuesPayload {
    action: String,
    issue: RawIssue,
    repository: RawRepository,
    sender: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    title: Option<String>,
}

fn parse_issues(payload: &[u8]) -> Result<IssuesEvent, ParseError> {
    let raw: RawIssuesPayload = serde_json::from_slice(payload)?;

    Ok(IssuesEvent {
        repo: raw.repository.full_name(),
        repo_remote_id: raw.repository.remote_id(),
        action: raw.action,
        number: raw.issue.number,
        title: raw.issue.title.unwrap_or_default(),
        actor: raw
            .sender
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

// create / delete (same payload shape)

#[derive(Debug, Deserialize)]
struct RawRefPayload {
    #[serde(rename = "ref")]
    ref_name: String,
    ref_type: String,
    repository: RawRepository,
    sender: Option<RawUser>,
}

fn parse_ref_event(payload: &[u8]) -> Result<RefEvent, ParseError> {
    let raw: RawRefPayload = serde_json::from_slice(payload)?;

    Ok(RefEvent {
        repo: raw.repository.full_name(),
        repo_remote_id: raw.repository.remote_id(),
        ref_type: raw.ref_type,
        ref_name: raw.ref_name,
        actor: raw
            .sender
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

// release

#[derive(Debug, Deserialize)]
struct RawReleasePayload {
    action: String,
    release: RawRelease,
    repository: RawRepository,
    sender: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    tag_name: String,
    name: Option<String>,
}

fn parse_release(payload: &[u8]) -> Result<ReleaseEvent, ParseError> {
    let raw: RawReleasePayload = serde_json::from_slice(payload)?;

    Ok(ReleaseEvent {
        repo: raw.repository.full_name(),
        repo_remote_id: raw.repository.remote_id(),
        action: raw.action,
        tag: raw.release.tag_name,
        name: raw.release.name,
        actor: raw
            .sender
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

// fork

#[derive(Debug, Deserialize)]
struct RawForkPayload {
    forkee: RawRepository,
    repository: RawRepository,
    sender: Option<RawUser>,
}

fn parse_fork(payload: &[u8]) -> Result<ForkEvent, ParseError> {
    let raw: RawForkPayload = serde_json::from_slice(payload)?;

    Ok(ForkEvent {
        repo: raw.repository.full_name(),
        repo_remote_id: raw.repository.remote_id(),
        fork_full_name: raw.forkee.full_name(),
        actor: raw
            .sender
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

// watch

#[derive(Debug, Deserialize)]
struct RawWatchPayload {
    repository: RawRepository,
    sender: Option<RawUser>,
}

fn parse_watch(payload: &[u8]) -> Result<WatchEvent, ParseError> {
    let raw: RawWatchPayload = serde_json::from_slice(payload)?;

    Ok(WatchEvent {
        repo: raw.repository.full_name(),
        repo_remote_id: raw.repository.remote_id(),
        actor: raw
            .sender
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_event_type_is_ignored() {
        let result = parse_event("deployment_status", b"{}").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn malformed_push_is_an_error() {
        let result = parse_event("push", b"{\"ref\": 42}");
        assert!(result.is_err());
    }

    #[test]
    fn parse_push_full_payload() {
        let payload = json!({
            "ref": "refs/heads/main",
            "before": "0".repeat(40),
            "after": "abc123".to_string() + &"0".repeat(34),
            "repository": {"id": 99, "full_name": "org/repo"},
            "pusher": {"name": "octocat"},
            "commits": [{
                "id": "abc123".to_string() + &"0".repeat(34),
                "message": "Fix login bug",
                "author": {"name": "Octo Cat", "email": "octo@example.edu"},
                "timestamp": "2024-05-01T12:00:00Z",
                "added": ["src/New.java"],
                "modified": ["src/App.java"],
                "removed": []
            }]
        });

        let event = parse_event("push", &serde_json::to_vec(&payload).unwrap())
            .unwrap()
            .unwrap();

        let GitHubEvent::Push(push) = event else {
            panic!("expected push event");
        };
        assert_eq!(push.repo.as_str(), "org/repo");
        assert_eq!(push.repo_remote_id, Some(RemoteId(99)));
        assert_eq!(push.branch(), Some("main"));
        assert_eq!(push.pusher, "octocat");
        assert_eq!(push.commits.len(), 1);
        assert_eq!(push.commits[0].modified, vec!["src/App.java"]);
        assert_eq!(push.commits[0].author_email, "octo@example.edu");
    }

    #[test]
    fn parse_push_minimal_payload() {
        // No pusher, no commits, no repository id.
        let payload = json!({
            "ref": "refs/tags/v1.0",
            "before": "0".repeat(40),
            "after": "1".repeat(40),
            "repository": {"full_name": "org/repo"}
        });

        let event = parse_event("push", &serde_json::to_vec(&payload).unwrap())
            .unwrap()
            .unwrap();

        let GitHubEvent::Push(push) = event else {
            panic!("expected push event");
        };
        assert_eq!(push.branch(), None);
        assert_eq!(push.pusher, "unknown");
        assert!(push.commits.is_empty());
        assert_eq!(push.repo_remote_id, None);
    }

    #[test]
    fn parse_pull_request_merged() {
        let payload = json!({
            "action": "closed",
            "pull_request": {
                "number": 7,
                "title": "Add grading pipeline",
                "merged": true,
                "base": {"ref": "main"}
            },
            "repository": {"id": 5, "full_name": "org/repo"},
            "sender": {"login": "prof"}
        });

        let event = parse_event("pull_request", &serde_json::to_vec(&payload).unwrap())
            .unwrap()
            .unwrap();

        let GitHubEvent::PullRequest(pr) = event else {
            panic!("expected pull_request event");
        };
        assert_eq!(pr.action, "closed");
        assert!(pr.merged);
        assert_eq!(pr.base_branch, "main");
        assert_eq!(pr.actor, "prof");
    }

    #[test]
    fn parse_create_and_delete_share_shape() {
        let payload = json!({
            "ref": "feature/x",
            "ref_type": "branch",
            "repository": {"full_name": "org/repo"},
            "sender": {"login": "student"}
        });
        let bytes = serde_json::to_vec(&payload).unwrap();

        let created = parse_event("create", &bytes).unwrap().unwrap();
        let deleted = parse_event("delete", &bytes).unwrap().unwrap();

        assert!(matches!(created, GitHubEvent::Create(_)));
        let GitHubEvent::Delete(e) = deleted else {
            panic!("expected delete event");
        };
        assert_eq!(e.ref_name, "feature/x");
        assert_eq!(e.ref_type, "branch");
    }

    #[test]
    fn parse_fork_extracts_forkee() {
        let payload = json!({
            "forkee": {"full_name": "student/repo"},
            "repository": {"full_name": "org/repo"},
            "sender": {"login": "student"}
        });

        let event = parse_event("fork", &serde_json::to_vec(&payload).unwrap())
            .unwrap()
            .unwrap();

        let GitHubEvent::Fork(fork) = event else {
            panic!("expected fork event");
        };
        assert_eq!(fork.fork_full_name.as_str(), "student/repo");
    }

    #[test]
    fn parse_release_and_watch() {
        let release = json!({
            "action": "published",
            "release": {"tag_name": "v2.0", "name": "Milestone 2"},
            "repository": {"full_name": "org/repo"},
            "sender": {"login": "ta"}
        });
        let event = parse_event("release", &serde_json::to_vec(&release).unwrap())
            .unwrap()
            .unwrap();
        let GitHubEvent::Release(r) = event else {
            panic!("expected release event");
        };
        assert_eq!(r.tag, "v2.0");

        let watch = json!({
            "repository": {"full_name": "org/repo"},
            "sender": {"login": "fan"}
        });
        let event = parse_event("watch", &serde_json::to_vec(&watch).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(event.actor(), "fan");
    }
}
