//! Lifecycle / supervisor: start-up ordering, shutdown signal fan-out, and
//! join-on-exit.
//!
//! Startup order: construct queue -> construct HTTP ingress (bind, not yet
//! accepting) -> construct writer pool -> start accepting -> start writer
//! workers. Shutdown is carried to every component via a single shared
//! `tokio_util::sync::CancellationToken`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::errors::IngestError;
use crate::metrics_server;
use crate::queue::TaskQueue;
use crate::{ingress, writer};

/// Waits for `SIGINT` or `SIGTERM`, whichever arrives first.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Runs the whole service until a shutdown signal arrives, then drains and
/// returns. Never used directly in tests; `main` is the only caller.
pub async fn run(settings: Settings) -> Result<(), IngestError> {
    let settings = Arc::new(settings);
    let shutdown = CancellationToken::new();

    // Queue first: both the ingress and the writer pool need a handle to it.
    let queue = Arc::new(TaskQueue::new(settings.queue_capacity));

    // Metrics/health server: an external scraping collaborator, started
    // before the ingress so `/metrics` is reachable as soon as traffic can
    // flow.
    let metrics_handle = tokio::spawn(metrics_server::run(settings.clone(), shutdown.clone()));

    // Writer pool: starts reconnecting immediately; it will simply find an
    // empty queue until the ingress starts accepting.
    let writer_handles = writer::spawn_pool(settings.clone(), queue.clone(), shutdown.clone());

    let ingress_settings = settings.clone();
    let ingress_queue = queue.clone();
    let ingress_shutdown = shutdown.clone();
    let mut ingress_handle = tokio::spawn(async move {
        ingress::run(ingress_settings, ingress_queue, ingress_shutdown).await
    });

    // A bind failure surfaces as the ingress task finishing before any
    // shutdown signal arrives; that must exit the process with a non-zero
    // code, so it races against the signal wait rather than being joined
    // unconditionally afterwards.
    let startup_failure = tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("shutdown signal received, draining");
            None
        }
        result = &mut ingress_handle => {
            Some(result)
        }
    };

    shutdown.cancel();
    queue.stop();

    if let Some(result) = startup_failure {
        for handle in writer_handles {
            let _ = handle.await;
        }
        let _ = metrics_handle.await;
        return match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(IngestError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))),
        };
    }

    let _ = ingress_handle.await;
    let _ = metrics_handle.await;

    for handle in writer_handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "writer exited with error"),
            Err(e) => tracing::error!(error = %e, "writer task panicked"),
        }
    }

    info!("shutdown complete");
    Ok(())
}
