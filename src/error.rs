use crate::config::ConfigError;
use crate::http::RouteError;
use crate::observability::logging::LoggingError;
use crate::server::ServerError;

/// Error type for user-supplied hooks: tasks, managed objects, applications.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("managed object {name} failed to start: {source}")]
    Managed {
        name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("bundle {name} failed: {source}")]
    Bundle {
        name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("application error: {0}")]
    Application(#[source] BoxError),
}

impl Error {
    /// Wrap an arbitrary error raised by application code.
    pub fn application(error: impl Into<BoxError>) -> Self {
        Self::Application(error.into())
    }
}
