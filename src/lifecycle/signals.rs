//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT / SIGTERM (Ctrl+C elsewhere)
//! - Report which one arrived so shutdown can be logged
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Signals only end the session; port release happens on the normal
//!   shutdown path

/// Resolve when the process is asked to terminate.
#[cfg(unix)]
pub async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut interrupt, mut terminate) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(i), Ok(t)) => (i, t),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Failed to install signal handlers, falling back to Ctrl+C");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    }
}

/// Resolve when the process is asked to terminate.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
