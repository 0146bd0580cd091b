//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Connector::start
//!     → tls.rs (load keypair, https only)
//!     → bind listener on the configured address
//!     → accept loop (raced against the close signal)
//!     → connection.rs (keep-alive, tracking)
//!     → hyper connection serving the surface's MethodRouter
//!
//! Connector::stop
//!     → close signal → accept loop returns Ok(())
//! ```
//!
//! # Design Decisions
//! - Listener acquired lazily at start, released at stop
//! - TLS is optional and handled per connection, after accept
//! - No graceful drain: open connections outlive the listener

pub mod connection;
pub mod connector;
pub mod tls;

pub use connector::{Connector, ConnectorError};
pub use tls::TlsError;
