//! Programmatic shutdown trigger.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// A latch that can stand in for the interrupt signal.
///
/// Clones share the same latch. Once triggered it stays triggered, so
/// waiters created afterwards complete immediately.
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// A future completing once [`trigger`](Self::trigger) has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
