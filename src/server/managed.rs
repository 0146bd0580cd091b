//! A server made of several connectors.
//!
//! # Responsibilities
//! - Start every connector concurrently
//! - Report the first connector failure, or return once interrupted
//! - Stop every connector on request
//!
//! # Design Decisions
//! - One spawned task per connector, fanned in over an mpsc channel
//! - Returning from `start_until` does not stop connectors that are still
//!   running; `stop` does
//! - Stop never fails; connector errors during stop are logged

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::lifecycle::signals;
use crate::net::{Connector, ConnectorError};
use crate::observability::logging::Logger;

/// Error type for server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("server cannot be started while {0}")]
    InvalidState(ServerState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Built,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerState::Built => "built",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
            ServerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

pub struct ManagedServer {
    connectors: Vec<Arc<Connector>>,
    state: Mutex<ServerState>,
    logger: Logger,
}

impl ManagedServer {
    pub fn new(connectors: Vec<Connector>, logger: Logger) -> Self {
        Self {
            connectors: connectors.into_iter().map(Arc::new).collect(),
            state: Mutex::new(ServerState::Built),
            logger,
        }
    }

    pub fn connectors(&self) -> &[Arc<Connector>] {
        &self.connectors
    }

    pub fn state(&self) -> ServerState {
        *self.lock_state()
    }

    /// Start every connector and run until one fails or the process is
    /// interrupted.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.start_until(signals::interrupt()).await
    }

    /// Start every connector and run until one fails, all of them finish,
    /// or `interrupt` completes.
    ///
    /// Returns the first connector error. Finishing normally or being
    /// interrupted returns `Ok(())`.
    pub async fn start_until<F>(&self, interrupt: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        {
            let mut state = self.lock_state();
            if *state != ServerState::Built {
                return Err(ServerError::InvalidState(*state));
            }
            *state = ServerState::Starting;
        }

        if self.connectors.is_empty() {
            self.logger
                .in_scope(|| tracing::warn!("Server has no connectors"));
            *self.lock_state() = ServerState::Running;
            return Ok(());
        }

        let (results_tx, mut results_rx) = mpsc::channel(self.connectors.len());
        for connector in &self.connectors {
            let connector = Arc::clone(connector);
            let results_tx = results_tx.clone();
            tokio::spawn(async move {
                let result = connector.start().await;
                let _ = results_tx.send(result).await;
            });
        }
        drop(results_tx);

        *self.lock_state() = ServerState::Running;
        self.logger.in_scope(|| {
            for connector in &self.connectors {
                let spec = connector.spec();
                tracing::info!(
                    connector = spec.kind.as_str(),
                    address = %spec.bind_address(),
                    prefix = connector.router().path_prefix(),
                    "Starting connector"
                );
            }
        });

        tokio::pin!(interrupt);
        let mut remaining = self.connectors.len();
        loop {
            tokio::select! {
                biased;

                result = results_rx.recv() => match result {
                    Some(Err(e)) => {
                        self.logger
                            .in_scope(|| tracing::error!(error = %e, "Connector failed"));
                        return Err(e.into());
                    }
                    Some(Ok(())) => {
                        remaining -= 1;
                        if remaining == 0 {
                            return Ok(());
                        }
                    }
                    // Every connector task is gone.
                    None => return Ok(()),
                },
                () = &mut interrupt => {
                    self.logger
                        .in_scope(|| tracing::info!("Interrupted, shutting down"));
                    return Ok(());
                }
            }
        }
    }

    /// Stop every connector in order. Safe to call more than once.
    pub fn stop(&self) {
        {
            let mut state = self.lock_state();
            if *state == ServerState::Stopped {
                return;
            }
            *state = ServerState::Stopping;
        }

        for connector in &self.connectors {
            if let Err(e) = connector.stop() {
                self.logger.in_scope(|| {
                    tracing::warn!(
                        address = %connector.spec().bind_address(),
                        error = %e,
                        "Error closing connector"
                    )
                });
            }
        }
        *self.lock_state() = ServerState::Stopped;
    }

    fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
