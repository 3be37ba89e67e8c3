//! Stop — graceful shutdown on Ctrl+C / SIGTERM.

use tracing::{error, warn};

/// Resolves once the process is asked to stop.
///
/// If a handler cannot be installed the corresponding branch never
/// resolves, so the replay simply runs to the end of its input.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, flushing build state and stopping...");
        },
        _ = terminate => {
            warn!("Received SIGTERM, flushing build state and stopping...");
        },
    }
}
