use std::{future::Future, future::IntoFuture, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{http::StatusCode, routing::get, Router};
use tokio::sync::oneshot;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{handlers, AppState};

/// Longest a single request may take before it is answered with 408.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long open connections get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// All routes of the redirect server.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::pages::index))
        .route("/info", get(handlers::pages::info))
        .route("/health", get(|| async { StatusCode::OK }))
        // Alias redirect; must come last so the fixed routes take priority
        .route("/*alias", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    tracing::info!("Listening on http://{}", listener.local_addr()?);
    println!("Go Links server started at {}", state.config.base_url());
    println!("Press Ctrl+C to stop the server");

    let (started_tx, started_rx) = oneshot::channel();
    let server = axum::serve(listener, router(state)).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = started_tx.send(());
    });

    let shutdown_started = async {
        // Err means the server ended on its own; it has already won the race.
        let _ = started_rx.await;
    };
    match with_grace(server.into_future(), shutdown_started, SHUTDOWN_GRACE).await {
        Some(result) => result.context("Server error")?,
        None => tracing::warn!(
            "Connections still open after {:?}; stopping anyway",
            SHUTDOWN_GRACE
        ),
    }

    println!("Server stopped");
    Ok(())
}

/// Run `server` to completion, but give up `grace` after `shutdown_started`
/// resolves. Returns `None` if the grace period ran out.
async fn with_grace<F, S>(server: F, shutdown_started: S, grace: Duration) -> Option<F::Output>
where
    F: Future,
    S: Future<Output = ()>,
{
    tokio::pin!(server);
    tokio::select! {
        biased;
        output = &mut server => Some(output),
        _ = async {
            shutdown_started.await;
            tokio::time::sleep(grace).await;
        } => None,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("\nShutting down server...");
}
