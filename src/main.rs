use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jira_relay::config::{DEFAULT_LOG_FILTER, RelayConfig};
use jira_relay::jira::HttpClientFactory;
use jira_relay::notify::MattermostPoster;
use jira_relay::server::{AppState, build_router};
use jira_relay::store::InMemoryStore;
use jira_relay::worker::{Pipeline, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env().context("reading configuration")?;
    info!(config = ?config, "Starting jira-relay");

    let store = match &config.store_path {
        Some(path) => InMemoryStore::from_json_file(path)
            .with_context(|| format!("loading store seed from {}", path.display()))?,
        None => InMemoryStore::new(),
    };
    let clients =
        HttpClientFactory::new(config.http_timeout).context("building Jira HTTP client")?;
    let poster = MattermostPoster::new(
        &config.mattermost_url,
        &config.mattermost_bot_token,
        config.http_timeout,
    )
    .context("building Mattermost HTTP client")?;

    let pipeline = Arc::new(Pipeline::new(
        store,
        clients,
        poster,
        config.mattermost_bot_user_id.as_str(),
    ));
    let (queue, pool) = WorkerPool::start(config.workers, config.queue_capacity, pipeline);

    let app = build_router(AppState::new(queue, config.webhook_secret.as_str()));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
            }
            shutdown.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!("listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("serving HTTP")?;

    // The router held the last queue handle; workers drain and exit.
    pool.join().await;
    info!("Worker pool drained");
    Ok(())
}
