//! Open connection bookkeeping for one connector.
//!
//! Connections are not drained when a connector stops; the count is only
//! reported so operators can see what was cut off.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sequence number of a connection within its connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    next_id: AtomicU64,
    open: AtomicU64,
}

/// Counts the connections a connector is serving.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counters: Arc<Counters>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection. It counts as open until the
    /// returned guard is dropped.
    pub fn open(&self, peer: SocketAddr) -> OpenConnection {
        let id = ConnectionId(self.counters.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        OpenConnection {
            counters: Arc::clone(&self.counters),
            id,
            peer,
        }
    }

    pub fn open_count(&self) -> u64 {
        self.counters.open.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct OpenConnection {
    counters: Arc<Counters>,
    id: ConnectionId,
    peer: SocketAddr,
}

impl OpenConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for OpenConnection {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, peer = %self.peer, "Connection closed");
    }
}
