//! Administrative surface.
//!
//! # Data Flow
//! ```text
//! admin connectors → admin MethodRouter
//!     GET  /ping          → "pong"
//!     GET  /healthcheck   → health::HealthCheckRegistry::run_all
//!     POST /tasks/{name}  → tasks::TaskRegistry
//! ```
//!
//! Routes are installed when the environment starts, after every component
//! has been dispatched into the registries.

pub mod handlers;
pub mod tasks;

use std::sync::Arc;

use axum::http::Method;

use crate::environment::component::EndpointLog;
use crate::health::{HealthCheck, HealthCheckRegistry};
use crate::http::{boxed, MethodRouter, RouteError};
use crate::observability::logging::Logger;

use self::tasks::{Task, TaskRegistry};

pub struct AdminEnvironment {
    router: MethodRouter,
    health_checks: HealthCheckRegistry,
    tasks: TaskRegistry,
    logger: Logger,
}

impl AdminEnvironment {
    pub fn new(context_path: &str, logger: Logger) -> Self {
        Self {
            router: MethodRouter::new(context_path),
            health_checks: HealthCheckRegistry::new(),
            tasks: TaskRegistry::new(),
            logger,
        }
    }

    pub fn router(&self) -> &MethodRouter {
        &self.router
    }

    pub fn health_checks(&self) -> &HealthCheckRegistry {
        &self.health_checks
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn add_health_check<H: HealthCheck + 'static>(&self, check: H) {
        self.health_checks.register(Arc::new(check));
    }

    pub fn add_task<T: Task + 'static>(&self, task: T) {
        self.tasks.register(Arc::new(task));
    }

    /// Register the admin endpoints and log them.
    pub(crate) fn install_routes(&self) -> Result<EndpointLog, RouteError> {
        let prefix = self.router.path_prefix().to_string();
        let mut endpoints = EndpointLog::default();

        self.router
            .handle(Method::GET, "/ping", boxed(handlers::ping))?;
        endpoints.log_endpoint(Method::GET, format!("{}/ping", prefix), "admin::ping");

        self.router.handle(
            Method::GET,
            "/healthcheck",
            boxed(handlers::healthcheck(self.health_checks.clone())),
        )?;
        endpoints.log_endpoint(Method::GET, format!("{}/healthcheck", prefix), "admin::healthcheck");

        let tasks_prefix = format!("{}/tasks/", prefix);
        self.router.handle(
            Method::POST,
            "/tasks/",
            boxed(handlers::run_task(self.tasks.clone(), tasks_prefix.clone())),
        )?;
        endpoints.log_endpoint(Method::POST, format!("{}{{name}}", tasks_prefix), "admin::tasks");

        self.logger.in_scope(|| {
            if self.health_checks.is_empty() {
                tracing::warn!("No health checks registered");
            }
            tracing::info!(tasks = ?self.tasks.names(), "admin =\n\n{}", endpoints);
        });
        Ok(endpoints)
    }
}
