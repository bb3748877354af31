use std::future::Future;

use tokio::signal;

use crate::cancel::CancellationSource;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}

/// Fire `source` on the first shutdown signal and return on the second, so
/// the caller can stop waiting for the abort to resolve.
pub async fn cancel_on_shutdown(source: CancellationSource) {
    cancel_then_escalate(source, wait_for_shutdown).await
}

pub async fn cancel_then_escalate<F, Fut>(source: CancellationSource, mut next_signal: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    next_signal().await;
    tracing::info!("Cancelling workflow, signal again to exit without waiting");
    source.cancel();

    next_signal().await;
    tracing::warn!("Second shutdown signal, exiting without waiting for the abort");
}
