//! HTTP server bootstrap and graceful shutdown.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal::unix::SignalKind;

use crate::config::Config;
use crate::endpoints;
use crate::state::ServiceState;

/// Runs the filestore HTTP server until termination is requested.
pub async fn server(config: Config) -> Result<()> {
    let state = ServiceState::new(&config).await?;

    let listener = TcpListener::bind(config.http_addr)
        .await
        .context("failed to bind HTTP listener")?;
    tracing::info!("HTTP server listening on {}", config.http_addr);

    let router = endpoints::routes().with_state(state);
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                elegant_departure::get_shutdown_guard().wait().await;
            })
            .await
    });

    elegant_departure::tokio::depart()
        .on_termination()
        .on_sigint()
        .on_signal(SignalKind::hangup())
        .on_signal(SignalKind::quit())
        .await;

    server_handle
        .await
        .context("server task panicked")?
        .context("server failed")?;

    tracing::info!("Shutdown complete");
    Ok(())
}
