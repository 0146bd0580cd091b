use std::sync::Arc;

use crate::config::{ConnectorSpec, ServerConfig};
use crate::environment::dispatcher::ResourceHandler;
use crate::environment::resource::HttpResourceHandler;
use crate::environment::Environment;
use crate::http::MethodRouter;
use crate::net::Connector;
use crate::observability::logging::Logger;
use crate::server::managed::{ManagedServer, ServerError};

/// Builds the server for an environment.
pub trait ServerFactory: Send + Sync {
    fn build_server(
        &self,
        config: &ServerConfig,
        environment: &mut Environment,
    ) -> Result<ManagedServer, ServerError>;
}

/// Separate connectors for the application and admin surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultServerFactory;

impl ServerFactory for DefaultServerFactory {
    fn build_server(
        &self,
        config: &ServerConfig,
        environment: &mut Environment,
    ) -> Result<ManagedServer, ServerError> {
        let logger = environment.logger().named("server");
        let application = environment.server().router().clone();
        let admin = environment.admin().router().clone();

        let mut connectors = connectors_for(&config.application_connectors, &application, &logger);
        connectors.extend(connectors_for(&config.admin_connectors, &admin, &logger));

        environment
            .server()
            .dispatcher_mut()
            .add_resource_handler([Arc::new(HttpResourceHandler::new(application)) as Arc<dyn ResourceHandler>]);

        Ok(ManagedServer::new(connectors, logger))
    }
}

fn connectors_for(specs: &[ConnectorSpec], router: &MethodRouter, logger: &Logger) -> Vec<Connector> {
    specs
        .iter()
        .map(|spec| Connector::new(spec.clone(), router.clone(), logger.named("connector")))
        .collect()
}
