mod bootstrap;
mod health;
mod webhook;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use orderline_agent::ToolContext;
use orderline_core::config::{AppConfig, LoadOptions};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn init_logging(config: &AppConfig) {
    use orderline_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let sweeper = spawn_session_sweeper(Arc::clone(&app.context));

    let routes = webhook::router(webhook::WebhookState::new(Arc::clone(&app.registry), Arc::clone(&app.context)))
        .merge(health::router(health::HealthState::new(app.db_pool.clone(), Arc::clone(&app.context))))
        .layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        tools = app.registry.len(),
        "orderline-server listening"
    );

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, routes)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    wait_for_shutdown().await?;
    tracing::info!(event_name = "system.server.stopping", correlation_id = "shutdown", "orderline-server stopping");
    let _ = stop_tx.send(());

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the shutdown deadline"
        ),
    }

    sweeper.abort();
    app.db_pool.close().await;
    Ok(())
}

/// Drops sessions that have been idle longer than the configured TTL.
fn spawn_session_sweeper(context: Arc<ToolContext>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = context.sessions.purge_expired(Instant::now());
            if purged > 0 {
                tracing::debug!(event_name = "order.session.purged", purged, "idle sessions removed");
            }
        }
    })
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}
