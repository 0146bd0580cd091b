//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Component with as_health_check()
//!     → HealthCheckHandler (claims it at startup)
//!     → HealthCheckRegistry (by name)
//!
//! GET {admin}/healthcheck
//!     → run every check
//!     → 200 if all healthy, 500 otherwise
//! ```
//!
//! # Design Decisions
//! - A panicking check counts as unhealthy instead of failing the request
//! - Registering a second check under an existing name replaces it, with a warning
//! - Results are reported sorted by name

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::environment::component::{Component, EndpointLog};
use crate::environment::dispatcher::ResourceHandler;
use crate::http::RouteError;
use crate::observability::logging::Logger;

/// A named probe of some dependency.
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self) -> HealthResult;
}

/// Outcome of one health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResult {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthResult {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
        }
    }

    pub fn healthy_with(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
        }
    }
}

/// Health checks by name. Clones share the same map.
#[derive(Clone, Default)]
pub struct HealthCheckRegistry {
    checks: Arc<DashMap<String, Arc<dyn HealthCheck>>>,
}

impl HealthCheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check, returning the one it replaced.
    pub fn register(&self, check: Arc<dyn HealthCheck>) -> Option<Arc<dyn HealthCheck>> {
        self.checks.insert(check.name().to_string(), check)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check.
    pub fn run_all(&self) -> BTreeMap<String, HealthResult> {
        let checks: Vec<(String, Arc<dyn HealthCheck>)> = self
            .checks
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        checks
            .into_iter()
            .map(|(name, check)| {
                let result = catch_unwind(AssertUnwindSafe(|| check.check()))
                    .unwrap_or_else(|_| HealthResult::unhealthy("health check panicked"));
                (name, result)
            })
            .collect()
    }
}

/// Claims health checks into a registry.
pub struct HealthCheckHandler {
    registry: HealthCheckRegistry,
    logger: Logger,
}

impl HealthCheckHandler {
    pub fn new(registry: HealthCheckRegistry, logger: Logger) -> Self {
        Self { registry, logger }
    }
}

impl ResourceHandler for HealthCheckHandler {
    fn try_claim(&self, component: &Arc<dyn Component>, _: &mut EndpointLog) -> Result<bool, RouteError> {
        let Some(check) = component.clone().as_health_check() else {
            return Ok(false);
        };
        if self.registry.register(check).is_some() {
            self.logger.in_scope(|| {
                tracing::warn!(component = component.type_name(), "Health check replaced an existing one with the same name")
            });
        }
        Ok(true)
    }
}
