//! Environment-driven configuration.
//!
//! Every setting has a default, so `Config::from_env` always succeeds; a
//! value that fails to parse is logged and replaced by the default rather
//! than aborting startup.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds.
    pub bind_addr: SocketAddr,

    /// Shared secret for webhook signature verification. With no secret
    /// configured, signature checking is disabled entirely.
    pub webhook_secret: Option<String>,

    /// When set, deliveries without a signature header are rejected instead
    /// of accepted unsigned.
    pub require_signature: bool,

    /// GitHub personal access token for the provider client.
    pub github_token: Option<String>,

    /// Public URL registered as the webhook callback.
    pub callback_url: String,

    /// Per-call deadline for provider requests.
    pub provider_timeout: Duration,

    /// Commit listing depth when walking a branch back to a known SHA.
    pub commit_walk_limit: usize,

    /// Consecutive delivery failures before a subscription is marked failed.
    pub failure_threshold: u32,

    /// Bulk resync skips repositories synced within this window.
    pub staleness_window: Duration,

    /// Bulk resync pause between owners.
    pub bulk_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            webhook_secret: None,
            require_signature: false,
            github_token: None,
            callback_url: "http://localhost:8080/webhooks/github".to_string(),
            provider_timeout: Duration::from_secs(30),
            commit_walk_limit: 100,
            failure_threshold: 5,
            staleness_window: Duration::from_secs(24 * 60 * 60),
            bulk_delay: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Reads configuration from `REPO_MIRROR_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            bind_addr: parsed_var("REPO_MIRROR_ADDR", defaults.bind_addr),
            webhook_secret: std::env::var("REPO_MIRROR_WEBHOOK_SECRET").ok(),
            require_signature: flag_var("REPO_MIRROR_REQUIRE_SIGNATURE"),
            github_token: std::env::var("REPO_MIRROR_GITHUB_TOKEN").ok(),
            callback_url: std::env::var("REPO_MIRROR_CALLBACK_URL")
                .unwrap_or(defaults.callback_url),
            provider_timeout: Duration::from_secs(parsed_var(
                "REPO_MIRROR_REMOTE_TIMEOUT_SECS",
                30,
            )),
            commit_walk_limit: parsed_var("REPO_MIRROR_COMMIT_WALK_LIMIT", 100),
            failure_threshold: parsed_var("REPO_MIRROR_FAILURE_THRESHOLD", 5),
            staleness_window: Duration::from_secs(
                parsed_var("REPO_MIRROR_STALENESS_HOURS", 24) * 60 * 60,
            ),
            bulk_delay: Duration::from_secs(parsed_var("REPO_MIRROR_BULK_DELAY_SECS", 1)),
        }
    }
}

fn parsed_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, value = %raw, "unparsable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// True for "1", "true", or "yes" (case-insensitive); false otherwise.
fn flag_var(name: &str) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => false,
    }
}
