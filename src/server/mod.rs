//! Server assembly.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → factory.rs (one Connector per spec, bound to its surface's router)
//!     → managed.rs (start all, fan in results, stop all)
//! ```

pub mod factory;
pub mod managed;

pub use factory::{DefaultServerFactory, ServerFactory};
pub use managed::{ManagedServer, ServerError, ServerState};
