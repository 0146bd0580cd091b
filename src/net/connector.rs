//! A single managed listener.
//!
//! # Responsibilities
//! - Bind the configured address when started, never before
//! - Optionally wrap accepted streams in TLS
//! - Serve every connection with the surface's router
//! - Stop on request by closing the listener
//!
//! # Design Decisions
//! - Stop latches a close signal that the serve loop races against
//!   `accept`; a deliberate close makes `start` return `Ok(())`
//! - A stopped connector stays stopped: starting it afterwards returns
//!   `Ok(())` without binding, and repeated stops are no-ops
//! - Running out of descriptors or buffers pauses accepting with a capped
//!   exponential backoff instead of failing the connector
//! - Connections already accepted are not drained on stop

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{ConnectorSpec, ConnectorType};
use crate::http::MethodRouter;
use crate::net::connection::ConnectionTracker;
use crate::net::tls::{load_tls_config, TlsError};
use crate::observability::logging::Logger;

/// Idle time before TCP keep-alive probes start on accepted connections.
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(3 * 60);

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Error type for connector operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// Where a connector's listener is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindState {
    Pending,
    Bound(SocketAddr),
    Closed,
}

/// One listener serving one surface's router.
pub struct Connector {
    spec: ConnectorSpec,
    router: MethodRouter,
    closed: watch::Sender<bool>,
    bound: watch::Sender<BindState>,
    connections: ConnectionTracker,
    logger: Logger,
}

impl Connector {
    pub fn new(spec: ConnectorSpec, router: MethodRouter, logger: Logger) -> Self {
        let (bound, _) = watch::channel(BindState::Pending);
        let (closed, _) = watch::channel(false);
        Self {
            spec,
            router,
            closed,
            bound,
            connections: ConnectionTracker::new(),
            logger,
        }
    }

    pub fn spec(&self) -> &ConnectorSpec {
        &self.spec
    }

    pub fn router(&self) -> &MethodRouter {
        &self.router
    }

    /// Address the listener is bound to, while it is running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.bound.borrow() {
            BindState::Bound(addr) => Some(addr),
            BindState::Pending | BindState::Closed => None,
        }
    }

    /// Wait until the listener is bound and return its address.
    ///
    /// Returns `None` once the connector has finished without binding or
    /// has already closed its listener.
    pub async fn wait_until_bound(&self) -> Option<SocketAddr> {
        let mut rx = self.bound.subscribe();
        let state = *rx.wait_for(|s| *s != BindState::Pending).await.ok()?;
        match state {
            BindState::Bound(addr) => Some(addr),
            BindState::Pending | BindState::Closed => None,
        }
    }

    /// Number of connections currently being served.
    pub fn open_connections(&self) -> u64 {
        self.connections.open_count()
    }

    /// Bind and serve until stopped.
    ///
    /// Returns `Ok(())` after [`stop`](Self::stop), or the error that ended
    /// the serve loop.
    pub async fn start(&self) -> Result<(), ConnectorError> {
        let mut close_rx = self.closed.subscribe();
        if *close_rx.borrow_and_update() {
            self.bound.send_replace(BindState::Closed);
            return Ok(());
        }

        let result = self.logger.in_future(self.serve(close_rx)).await;

        self.bound.send_replace(BindState::Closed);
        result
    }

    /// Close the listener. Takes effect even if `start` has not run yet.
    pub fn stop(&self) -> Result<(), ConnectorError> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        let open = self.connections.open_count();
        self.logger.in_scope(|| {
            tracing::info!(
                connector = self.spec.kind.as_str(),
                address = %self.spec.bind_address(),
                open_connections = open,
                "Stopping connector"
            )
        });
        Ok(())
    }

    fn tls_acceptor(&self) -> Result<Option<TlsAcceptor>, TlsError> {
        if self.spec.kind != ConnectorType::Https {
            return Ok(None);
        }
        let cert = self
            .spec
            .cert_file
            .as_deref()
            .ok_or(TlsError::NotConfigured("cert_file"))?;
        let key = self
            .spec
            .key_file
            .as_deref()
            .ok_or(TlsError::NotConfigured("key_file"))?;
        Ok(Some(TlsAcceptor::from(load_tls_config(cert, key)?)))
    }

    async fn serve(&self, mut close_rx: watch::Receiver<bool>) -> Result<(), ConnectorError> {
        let tls = self.tls_acceptor()?;
        let address = self.spec.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ConnectorError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ConnectorError::Bind { address, source })?;
        self.bound.send_replace(BindState::Bound(local_addr));

        tracing::info!(
            connector = self.spec.kind.as_str(),
            address = %local_addr,
            "Connector started"
        );

        let mut backoff = AcceptBackoff::default();
        let mut paused = None;
        loop {
            tokio::select! {
                biased;
                // The flag only ever flips to true.
                _ = close_rx.changed() => {
                    tracing::info!(address = %local_addr, "Connector stopped");
                    return Ok(());
                }
                () = sleep_for(paused), if paused.is_some() => paused = None,
                accepted = listener.accept(), if paused.is_none() => match accepted {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        self.spawn_connection(stream, peer, tls.clone());
                    }
                    Err(e) if is_transient(&e) => {
                        tracing::debug!(error = %e, "Transient accept error");
                    }
                    Err(e) if is_resource_exhausted(&e) => {
                        let delay = backoff.next_delay();
                        tracing::warn!(
                            address = %local_addr,
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "Accept failed, retrying"
                        );
                        paused = Some(delay);
                    }
                    Err(e) => {
                        tracing::error!(address = %local_addr, error = %e, "Accept failed");
                        return Err(ConnectorError::Accept(e));
                    }
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, tls: Option<TlsAcceptor>) {
        if let Err(e) = enable_keepalive(&stream) {
            tracing::debug!(peer = %peer, error = %e, "Could not enable TCP keep-alive");
        }

        let connection = self.connections.open(peer);
        tracing::debug!(peer = %peer, connection_id = %connection.id(), "Connection accepted");

        let service = TowerToHyperService::new(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .map_request(|request: Request<Incoming>| request.map(Body::new))
                .service(self.router.clone()),
        );

        tokio::spawn(self.logger.in_future(async move {
            let _connection = connection;
            let builder = auto::Builder::new(TokioExecutor::new());
            let result = match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => builder.serve_connection(TokioIo::new(stream), service).await,
                    Err(e) => {
                        tracing::debug!(peer = %peer, error = %e, "TLS handshake failed");
                        return;
                    }
                },
                None => builder.serve_connection(TokioIo::new(stream), service).await,
            };
            if let Err(e) = result {
                tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
            }
        }));
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("spec", &self.spec)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

fn enable_keepalive(stream: &TcpStream) -> io::Result<()> {
    let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_PERIOD);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

async fn sleep_for(delay: Option<Duration>) {
    tokio::time::sleep(delay.unwrap_or_default()).await;
}

/// Delay between accept attempts while the process is out of resources.
#[derive(Debug, Default)]
struct AcceptBackoff {
    current: Option<Duration>,
}

impl AcceptBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => ACCEPT_BACKOFF_MIN,
            Some(prev) => (prev * 2).min(ACCEPT_BACKOFF_MAX),
        };
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

/// Accept errors caused by process or system limits, which clear up once
/// connections close.
fn is_resource_exhausted(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::OutOfMemory || is_exhausted_os_error(e)
}

#[cfg(unix)]
fn is_exhausted_os_error(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_exhausted_os_error(_: &io::Error) -> bool {
    false
}

/// Accept errors that concern a single peer rather than the listener.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
