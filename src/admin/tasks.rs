//! Operator-triggered tasks.
//!
//! A task runs when the admin surface receives `POST /tasks/{name}`. Query
//! string and form-encoded body parameters are passed to it.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::environment::component::{Component, EndpointLog};
use crate::environment::dispatcher::ResourceHandler;
use crate::error::BoxError;
use crate::http::RouteError;
use crate::observability::logging::Logger;

/// Request parameters; a key may repeat.
pub type TaskParams = HashMap<String, Vec<String>>;

/// An action operators can run on demand.
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Run the task. The returned text becomes the response body.
    fn execute(&self, params: &TaskParams) -> Result<String, BoxError>;
}

/// Tasks by name. Clones share the same map.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<String, Arc<dyn Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task, returning the one it replaced.
    pub fn register(&self, task: Arc<dyn Task>) -> Option<Arc<dyn Task>> {
        self.tasks.insert(task.name().to_string(), task)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// Parse `a=1&b=2&a=3` into grouped parameters.
pub fn parse_params(params: &mut TaskParams, encoded: &[u8]) {
    for (key, value) in url::form_urlencoded::parse(encoded) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
}

/// Claims tasks into a registry.
pub struct TaskHandler {
    registry: TaskRegistry,
    logger: Logger,
}

impl TaskHandler {
    pub fn new(registry: TaskRegistry, logger: Logger) -> Self {
        Self { registry, logger }
    }
}

impl ResourceHandler for TaskHandler {
    fn try_claim(&self, component: &Arc<dyn Component>, _: &mut EndpointLog) -> Result<bool, RouteError> {
        let Some(task) = component.clone().as_task() else {
            return Ok(false);
        };
        if self.registry.register(task).is_some() {
            self.logger.in_scope(|| {
                tracing::warn!(component = component.type_name(), "Task replaced an existing one with the same name")
            });
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Task for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn execute(&self, params: &TaskParams) -> Result<String, BoxError> {
            Ok(params.get("msg").map(|v| v.join(",")).unwrap_or_default())
        }
    }

    impl Component for Echo {
        fn as_task(self: Arc<Self>) -> Option<Arc<dyn Task>> {
            Some(self)
        }
    }

    #[test]
    fn parses_repeated_keys() {
        let mut params = TaskParams::new();
        parse_params(&mut params, b"msg=a&msg=b%20c&flag");
        assert_eq!(params["msg"], vec!["a".to_string(), "b c".to_string()]);
        assert_eq!(params["flag"], vec![String::new()]);
    }

    #[test]
    fn handler_registers_task_by_name() {
        let registry = TaskRegistry::new();
        let handler = TaskHandler::new(registry.clone(), Logger::new("test"));
        let echo: Arc<dyn Component> = Arc::new(Echo);

        assert!(handler.try_claim(&echo, &mut EndpointLog::default()).unwrap());
        assert_eq!(registry.names(), vec!["echo".to_string()]);

        let mut params = TaskParams::new();
        parse_params(&mut params, b"msg=hi");
        assert_eq!(registry.get("echo").unwrap().execute(&params).unwrap(), "hi");
        assert!(registry.get("other").is_none());
    }
}
