//! HTTP request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net::connector)
//!     → hyper connection + TraceLayer
//!     → router.rs (path lookup → verb lookup)
//!     → handler.rs (registered handler produces the response)
//!
//! No path match      → 404
//! Path match, no verb → 405
//! ```

pub mod handler;
pub mod router;

pub use handler::{boxed, BoxHandler, Handler, HandlerFuture};
pub use router::{MethodRouter, RouteError};
