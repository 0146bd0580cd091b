//! Application server harness.
//!
//! Serves an application's HTTP resources on one or more connectors, next to
//! an admin surface with health checks and tasks, and drives an orderly
//! startup and shutdown around it.

pub mod admin;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;

pub use config::Configuration;
pub use environment::component::Component;
pub use environment::resource::{Resource, Route};
pub use environment::Environment;
pub use error::{BoxError, Error, Result};
pub use http::MethodRouter;
pub use lifecycle::{Application, Bootstrap, Shutdown};
pub use server::ManagedServer;
