//! Component dispatch.
//!
//! # Responsibilities
//! - Collect components registered during setup
//! - Hold the chain of resource handlers
//! - Walk every component through the chain exactly once, at startup
//!
//! # Design Decisions
//! - The most recently added handler is asked first; the first claim wins.
//!   Later bundles can specialise how a shape is wired without removing
//!   earlier handlers.
//! - Unclaimed components are logged, not fatal
//! - A route conflict while wiring aborts dispatch
//! - Not synchronised: registration happens during single-threaded setup.
//!   Components registered after `finalize` are never dispatched.

use std::sync::Arc;

use crate::environment::component::{Component, EndpointLog};
use crate::http::RouteError;
use crate::observability::logging::Logger;

/// A claim-and-wire strategy for one component shape.
pub trait ResourceHandler: Send + Sync {
    /// Wire `component` if it has the shape this handler understands.
    ///
    /// Returns `Ok(false)` to let older handlers try. Endpoints that become
    /// reachable over HTTP are recorded in `endpoints`.
    fn try_claim(
        &self,
        component: &Arc<dyn Component>,
        endpoints: &mut EndpointLog,
    ) -> Result<bool, RouteError>;
}

impl<F> ResourceHandler for F
where
    F: Fn(&Arc<dyn Component>, &mut EndpointLog) -> Result<bool, RouteError> + Send + Sync,
{
    fn try_claim(
        &self,
        component: &Arc<dyn Component>,
        endpoints: &mut EndpointLog,
    ) -> Result<bool, RouteError> {
        self(component, endpoints)
    }
}

pub struct ComponentDispatcher {
    handlers: Vec<Arc<dyn ResourceHandler>>,
    components: Vec<Arc<dyn Component>>,
    finalized: bool,
    logger: Logger,
}

impl ComponentDispatcher {
    pub fn new(logger: Logger) -> Self {
        Self {
            handlers: Vec::new(),
            components: Vec::new(),
            finalized: false,
            logger,
        }
    }

    /// Append components in the order given.
    pub fn register<I>(&mut self, components: I)
    where
        I: IntoIterator<Item = Arc<dyn Component>>,
    {
        let before = self.components.len();
        self.components.extend(components);
        if self.finalized && self.components.len() > before {
            let late: Vec<&'static str> = self.components[before..]
                .iter()
                .map(|c| c.type_name())
                .collect();
            self.logger.in_scope(|| {
                tracing::warn!(components = ?late, "Components registered after startup are not dispatched")
            });
        }
    }

    /// Register a single component.
    pub fn register_component<C: Component>(&mut self, component: C) {
        self.register([Arc::new(component) as Arc<dyn Component>]);
    }

    /// Append handlers to the chain. Handlers added later are tried first.
    pub fn add_resource_handler<I>(&mut self, handlers: I)
    where
        I: IntoIterator<Item = Arc<dyn ResourceHandler>>,
    {
        self.handlers.extend(handlers);
    }

    pub fn components(&self) -> &[Arc<dyn Component>] {
        &self.components
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Dispatch every registered component and log the resulting endpoints.
    ///
    /// Runs once; later calls return an empty log.
    pub fn finalize(&mut self) -> Result<EndpointLog, RouteError> {
        let mut endpoints = EndpointLog::default();
        if self.finalized {
            self.logger
                .in_scope(|| tracing::debug!("Components already dispatched"));
            return Ok(endpoints);
        }
        self.finalized = true;

        for component in &self.components {
            let claimed = self.dispatch(component, &mut endpoints).inspect_err(|e| {
                self.logger.in_scope(|| {
                    tracing::error!(component = component.type_name(), error = %e, "Could not wire component")
                })
            })?;
            if !claimed {
                self.logger.in_scope(|| {
                    tracing::warn!(component = component.type_name(), "Could not handle component")
                });
            }
        }

        self.logger
            .in_scope(|| tracing::info!("resources =\n\n{}", endpoints));
        Ok(endpoints)
    }

    fn dispatch(
        &self,
        component: &Arc<dyn Component>,
        endpoints: &mut EndpointLog,
    ) -> Result<bool, RouteError> {
        for handler in self.handlers.iter().rev() {
            if handler.try_claim(component, endpoints)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
