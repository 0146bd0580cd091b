//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events through an injected Logger)
//!
//! Connectors add:
//!     → tower_http TraceLayer (one span per request)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Components never look up a logger by name; they are handed one

pub mod logging;
