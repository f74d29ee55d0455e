use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repo_mirror::aggregate::ReadAggregator;
use repo_mirror::config::Config;
use repo_mirror::notify::{EmptyResolver, LoggingInsightClient, LoggingSink};
use repo_mirror::provider::{GitHubProvider, RetryConfig};
use repo_mirror::server::{AppState, AppStateInner, build_router};
use repo_mirror::store::MirrorStore;
use repo_mirror::sync::{BulkOptions, BulkResync, SyncEngine, SyncOptions};
use repo_mirror::tracker::DeliveryTracker;
use repo_mirror::versions::VersionEngine;
use repo_mirror::webhooks::EventRouter;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repo_mirror=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let provider = match &config.github_token {
        Some(token) => GitHubProvider::from_token(token.clone(), config.provider_timeout),
        None => {
            tracing::warn!("REPO_MIRROR_GITHUB_TOKEN not set, using unauthenticated client");
            GitHubProvider::anonymous(config.provider_timeout)
        }
    }
    .unwrap_or_else(|err| panic!("failed to build GitHub client: {err}"));
    let provider = Arc::new(provider);

    let store = Arc::new(MirrorStore::new());
    let sync = Arc::new(SyncEngine::new(
        store.clone(),
        provider,
        SyncOptions {
            commit_walk_limit: config.commit_walk_limit,
            retry: RetryConfig::DEFAULT,
        },
    ));

    let shutdown = CancellationToken::new();
    let bulk = BulkResync::spawn(
        sync.clone(),
        BulkOptions {
            staleness_window: config.staleness_window,
            inter_user_delay: config.bulk_delay,
        },
        shutdown.clone(),
    );

    let addr = config.bind_addr;
    let state = AppState::new(AppStateInner {
        store: store.clone(),
        tracker: DeliveryTracker::new(store.clone(), config.failure_threshold),
        sync,
        versions: VersionEngine::new(store.clone()),
        aggregator: ReadAggregator::new(store),
        router: EventRouter::new(),
        resolver: Arc::new(EmptyResolver),
        sink: Arc::new(LoggingSink),
        insights: Arc::new(LoggingInsightClient),
        bulk,
        config,
    });
    let app = build_router(state);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        })
        .await
        .unwrap();
}
