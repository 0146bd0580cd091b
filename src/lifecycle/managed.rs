//! Objects whose lifetime follows the server's.
//!
//! Managed objects start when the environment enters "starting", in the
//! order they were registered, and stop on "stopped" in reverse order. Only
//! objects that actually started are stopped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::environment::component::{Component, EndpointLog};
use crate::environment::dispatcher::ResourceHandler;
use crate::error::{BoxError, Error};
use crate::http::RouteError;
use crate::observability::logging::Logger;

pub trait Managed: Send + Sync {
    fn start(&self) -> Result<(), BoxError>;

    fn stop(&self) -> Result<(), BoxError>;
}

#[derive(Clone)]
struct Entry {
    name: &'static str,
    object: Arc<dyn Managed>,
}

#[derive(Default)]
struct State {
    managed: Vec<Entry>,
    /// Length of the prefix of `managed` that has been started.
    started: usize,
}

/// Registry of managed objects. Clones share the same list.
#[derive(Clone)]
pub struct LifecycleEnvironment {
    state: Arc<Mutex<State>>,
    logger: Logger,
}

impl LifecycleEnvironment {
    pub fn new(logger: Logger) -> Self {
        Self {
            state: Arc::default(),
            logger,
        }
    }

    pub fn manage<M: Managed + 'static>(&self, object: M) {
        self.manage_shared(std::any::type_name::<M>(), Arc::new(object));
    }

    pub fn manage_shared(&self, name: &'static str, object: Arc<dyn Managed>) {
        self.lock().managed.push(Entry { name, object });
    }

    pub fn len(&self) -> usize {
        self.lock().managed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start every object not yet started. Stops at the first failure.
    pub fn start(&self) -> Result<(), Error> {
        let pending: Vec<Entry> = {
            let state = self.lock();
            state.managed[state.started..].to_vec()
        };

        for entry in pending {
            self.logger
                .in_scope(|| tracing::debug!(managed = entry.name, "Starting managed object"));
            if let Err(source) = entry.object.start() {
                self.logger.in_scope(|| {
                    tracing::error!(managed = entry.name, error = %source, "Managed object failed to start")
                });
                return Err(Error::Managed {
                    name: entry.name,
                    source,
                });
            }
            self.lock().started += 1;
        }
        Ok(())
    }

    /// Stop started objects in reverse order. Failures are logged.
    pub fn stop(&self) {
        loop {
            let entry = {
                let mut state = self.lock();
                if state.started == 0 {
                    return;
                }
                state.started -= 1;
                state.managed[state.started].clone()
            };

            self.logger
                .in_scope(|| tracing::debug!(managed = entry.name, "Stopping managed object"));
            if let Err(e) = entry.object.stop() {
                self.logger.in_scope(|| {
                    tracing::warn!(managed = entry.name, error = %e, "Managed object failed to stop")
                });
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Claims managed objects into a lifecycle environment.
pub struct ManagedHandler {
    lifecycle: LifecycleEnvironment,
}

impl ManagedHandler {
    pub fn new(lifecycle: LifecycleEnvironment) -> Self {
        Self { lifecycle }
    }
}

impl ResourceHandler for ManagedHandler {
    fn try_claim(&self, component: &Arc<dyn Component>, _: &mut EndpointLog) -> Result<bool, RouteError> {
        match component.clone().as_managed() {
            Some(object) => {
                self.lifecycle.manage_shared(component.type_name(), object);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
