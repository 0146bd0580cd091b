//! Application environment.
//!
//! # Data Flow
//! ```text
//! Bundle::run / Application::run
//!     → environment.server().register(component)
//!
//! set_starting():
//!     ComponentDispatcher::finalize
//!         → resources     → application MethodRouter
//!         → health checks → admin registry
//!         → tasks         → admin registry
//!         → managed       → LifecycleEnvironment
//!     → admin routes installed
//!     → managed objects started
//!
//! set_stopped():
//!     → managed objects stopped, newest first
//! ```

pub mod component;
pub mod dispatcher;
pub mod resource;

use std::sync::Arc;

use crate::admin::tasks::TaskHandler;
use crate::admin::AdminEnvironment;
use crate::config::ServerConfig;
use crate::health::HealthCheckHandler;
use crate::http::MethodRouter;
use crate::lifecycle::managed::{LifecycleEnvironment, ManagedHandler};
use crate::observability::logging::Logger;

use self::component::{Component, EndpointLog};
use self::dispatcher::{ComponentDispatcher, ResourceHandler};

/// The application surface: its router and the components to serve on it.
pub struct ServerEnvironment {
    router: MethodRouter,
    dispatcher: ComponentDispatcher,
}

impl ServerEnvironment {
    pub fn router(&self) -> &MethodRouter {
        &self.router
    }

    pub fn dispatcher(&self) -> &ComponentDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut ComponentDispatcher {
        &mut self.dispatcher
    }

    pub fn register<C: Component>(&mut self, component: C) {
        self.dispatcher.register_component(component);
    }

    pub fn register_shared(&mut self, component: Arc<dyn Component>) {
        self.dispatcher.register([component]);
    }

    pub fn add_resource_handler<H: ResourceHandler + 'static>(&mut self, handler: H) {
        self.dispatcher
            .add_resource_handler([Arc::new(handler) as Arc<dyn ResourceHandler>]);
    }
}

pub struct Environment {
    name: String,
    server: ServerEnvironment,
    admin: AdminEnvironment,
    lifecycle: LifecycleEnvironment,
    logger: Logger,
}

impl Environment {
    pub fn new(name: impl Into<String>, config: &ServerConfig, logger: &Logger) -> Self {
        let admin = AdminEnvironment::new(&config.admin_context_path, logger.named("admin"));
        let lifecycle = LifecycleEnvironment::new(logger.named("lifecycle"));

        let mut dispatcher = ComponentDispatcher::new(logger.named("dispatcher"));
        dispatcher.add_resource_handler([
            Arc::new(HealthCheckHandler::new(
                admin.health_checks().clone(),
                logger.named("health"),
            )) as Arc<dyn ResourceHandler>,
            Arc::new(TaskHandler::new(admin.tasks().clone(), logger.named("tasks"))),
            Arc::new(ManagedHandler::new(lifecycle.clone())),
        ]);

        Self {
            name: name.into(),
            server: ServerEnvironment {
                router: MethodRouter::new(&config.application_context_path),
                dispatcher,
            },
            admin,
            lifecycle,
            logger: logger.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server(&mut self) -> &mut ServerEnvironment {
        &mut self.server
    }

    pub fn admin(&self) -> &AdminEnvironment {
        &self.admin
    }

    pub fn lifecycle(&self) -> &LifecycleEnvironment {
        &self.lifecycle
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Wire every registered component, install the admin endpoints and
    /// start managed objects.
    pub fn set_starting(&mut self) -> crate::Result<EndpointLog> {
        let endpoints = self.server.dispatcher.finalize()?;
        self.admin.install_routes()?;
        self.lifecycle.start()?;
        Ok(endpoints)
    }

    /// Stop managed objects. Safe to call more than once.
    pub fn set_stopped(&self) {
        self.lifecycle.stop();
    }
}
