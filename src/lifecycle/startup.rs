//! Startup orchestration.
//!
//! # Responsibilities
//! - Build and validate configuration
//! - Build the environment and the server
//! - Let bundles and the application register their components
//! - Wire components, start managed objects, then start the server
//! - Undo all of it on the way out, whatever the outcome
//!
//! # Design Decisions
//! - Fail fast: any setup error aborts before a listener is bound
//! - Connectors are stopped before managed objects, so nothing serves
//!   traffic through an object that is already shut down

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{load_config, validate_config, ConfigError, Configuration};
use crate::environment::Environment;
use crate::error::{BoxError, Error, Result};
use crate::lifecycle::signals;
use crate::observability::logging::{self, Logger};
use crate::server::{DefaultServerFactory, ServerFactory};

/// A program served by the harness.
pub trait Application: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Called once when the bootstrap is created. Add bundles or replace
    /// factories here.
    fn initialize(&self, _bootstrap: &mut Bootstrap) {}

    /// Register the application's components. Runs after every bundle.
    fn run(&self, configuration: &Configuration, environment: &mut Environment) -> Result<()>;
}

/// A reusable group of components.
pub trait Bundle: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Called once when the bundle is added to the bootstrap.
    fn initialize(&self, _bootstrap: &mut Bootstrap) {}

    fn run(&self, configuration: &Configuration, environment: &mut Environment) -> Result<(), BoxError>;
}

/// Source of the configuration.
pub trait ConfigurationFactory: Send + Sync {
    fn build(&self) -> Result<Configuration, ConfigError>;
}

/// Reads configuration from a TOML file.
#[derive(Debug, Clone)]
pub struct FileConfigurationFactory {
    path: PathBuf,
}

impl FileConfigurationFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigurationFactory for FileConfigurationFactory {
    fn build(&self) -> Result<Configuration, ConfigError> {
        load_config(&self.path)
    }
}

/// Serves a configuration built in code.
impl ConfigurationFactory for Configuration {
    fn build(&self) -> Result<Configuration, ConfigError> {
        validate_config(self)?;
        Ok(self.clone())
    }
}

/// Everything needed before the environment exists.
pub struct Bootstrap {
    application: Arc<dyn Application>,
    bundles: Vec<Arc<dyn Bundle>>,
    configuration_factory: Box<dyn ConfigurationFactory>,
    server_factory: Box<dyn ServerFactory>,
    install_logging: bool,
    logger: Option<Logger>,
}

impl Bootstrap {
    /// Create a bootstrap with default factories and run the application's
    /// `initialize` hook on it.
    pub fn new<A: Application>(application: A) -> Self {
        let application: Arc<dyn Application> = Arc::new(application);
        let mut bootstrap = Self {
            application: Arc::clone(&application),
            bundles: Vec::new(),
            configuration_factory: Box::new(Configuration::default()),
            server_factory: Box::new(DefaultServerFactory),
            install_logging: false,
            logger: None,
        };
        application.initialize(&mut bootstrap);
        bootstrap
    }

    pub fn application(&self) -> &Arc<dyn Application> {
        &self.application
    }

    /// Add a bundle after running its `initialize` hook.
    pub fn add_bundle<B: Bundle>(&mut self, bundle: B) {
        bundle.initialize(self);
        self.bundles.push(Arc::new(bundle));
    }

    pub fn bundles(&self) -> &[Arc<dyn Bundle>] {
        &self.bundles
    }

    pub fn set_configuration_factory<F: ConfigurationFactory + 'static>(&mut self, factory: F) {
        self.configuration_factory = Box::new(factory);
    }

    pub fn set_server_factory<F: ServerFactory + 'static>(&mut self, factory: F) {
        self.server_factory = Box::new(factory);
    }

    /// Install the global subscriber from the `[logging]` section when the
    /// server command runs.
    pub fn set_install_logging(&mut self, install: bool) {
        self.install_logging = install;
    }

    /// Log through `logger` instead of the default dispatcher.
    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = Some(logger);
    }

    /// Build and validate the configuration.
    pub fn configuration(&self) -> Result<Configuration, ConfigError> {
        self.configuration_factory.build()
    }

    pub fn server_factory(&self) -> &dyn ServerFactory {
        self.server_factory.as_ref()
    }

    fn logger(&self) -> Logger {
        self.logger.clone().unwrap_or_else(|| Logger::new("server"))
    }

    fn run_bundles(&self, configuration: &Configuration, environment: &mut Environment) -> Result<()> {
        for bundle in &self.bundles {
            bundle
                .run(configuration, environment)
                .map_err(|source| Error::Bundle {
                    name: bundle.name(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Runs the application as an HTTP server.
pub struct ServerCommand;

impl ServerCommand {
    /// Run until the process is interrupted or a connector fails.
    pub async fn run(bootstrap: &Bootstrap) -> Result<()> {
        Self::run_until(bootstrap, signals::interrupt()).await
    }

    /// Run until `interrupt` completes or a connector fails.
    pub async fn run_until<F>(bootstrap: &Bootstrap, interrupt: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let configuration = bootstrap.configuration()?;
        if bootstrap.install_logging {
            logging::init(&configuration.logging)?;
        }
        let logger = bootstrap.logger();

        let name = bootstrap.application().name().to_string();
        let mut environment = Environment::new(name.as_str(), &configuration.server, &logger);

        let server = bootstrap
            .server_factory()
            .build_server(&configuration.server, &mut environment)
            .inspect_err(|e| logger.in_scope(|| tracing::error!(error = %e, "Could not create server")))?;

        bootstrap
            .run_bundles(&configuration, &mut environment)
            .inspect_err(|e| logger.in_scope(|| tracing::error!(error = %e, "Could not run bootstrap")))?;
        bootstrap
            .application()
            .run(&configuration, &mut environment)
            .inspect_err(|e| logger.in_scope(|| tracing::error!(error = %e, "Could not run application")))?;

        logger.in_scope(|| tracing::info!("starting {}", name));

        // Declared first so it runs last.
        let lifecycle = environment.lifecycle().clone();
        let _stopped = OnDrop::new(move || lifecycle.stop());
        environment.set_starting()?;

        let _stop_server = OnDrop::new(|| server.stop());
        server
            .start_until(interrupt)
            .await
            .inspect_err(|e| logger.in_scope(|| tracing::error!(error = %e, "Could not start server")))?;
        Ok(())
    }
}

/// Parses and validates the configuration without starting anything.
pub struct CheckCommand;

impl CheckCommand {
    pub fn run(bootstrap: &Bootstrap) -> Result<()> {
        bootstrap.configuration()?;
        bootstrap
            .logger()
            .in_scope(|| tracing::info!("Configuration is OK"));
        Ok(())
    }
}

/// Runs a closure when dropped.
struct OnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> OnDrop<F> {
    fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}
