//! OS signal handling.
//!
//! # Design Decisions
//! - Only the interrupt signal (Ctrl+C / SIGINT) ends a running server
//! - If the handler cannot be installed the server runs until stopped by
//!   other means

/// Complete when the process receives an interrupt.
pub async fn interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    }
}
