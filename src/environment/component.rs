//! Registered components and the capabilities they expose.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::admin::tasks::Task;
use crate::environment::resource::Resource;
use crate::health::HealthCheck;
use crate::lifecycle::managed::Managed;

/// Any object registered with the environment.
///
/// A component advertises the shapes it can take through the `as_*`
/// capability queries. Resource handlers decide what to do with each shape;
/// a component that no handler claims is logged and otherwise ignored.
pub trait Component: Send + Sync + 'static {
    /// Type name used in logs and the endpoint table.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn as_resource(self: Arc<Self>) -> Option<Arc<dyn Resource>> {
        None
    }

    fn as_health_check(self: Arc<Self>) -> Option<Arc<dyn HealthCheck>> {
        None
    }

    fn as_task(self: Arc<Self>) -> Option<Arc<dyn Task>> {
        None
    }

    fn as_managed(self: Arc<Self>) -> Option<Arc<dyn Managed>> {
        None
    }

    /// Hook for handlers that recognise concrete types of their own.
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

/// One HTTP endpoint exposed by a claimed component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    /// Full path including the surface's context path.
    pub path: String,
    pub type_name: &'static str,
}

/// Endpoints collected while dispatching components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointLog {
    entries: Vec<Endpoint>,
}

impl EndpointLog {
    pub fn log_endpoint(&mut self, method: Method, path: impl Into<String>, type_name: &'static str) {
        self.entries.push(Endpoint {
            method,
            path: path.into(),
            type_name,
        });
    }

    pub fn entries(&self) -> &[Endpoint] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for EndpointLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "    {:<7} {} ({})",
                entry.method.as_str(),
                entry.path,
                entry.type_name
            )?;
        }
        Ok(())
    }
}
