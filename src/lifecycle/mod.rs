//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Configuration → Environment → Server → Bundles → Application
//!         → set_starting → start connectors
//!
//! Shutdown:
//!     interrupt (signals.rs) or Shutdown::trigger (shutdown.rs)
//!         → stop connectors → stop managed objects (managed.rs)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nothing listens until every component is wired
//! - Ordered shutdown: connectors first, then managed objects in reverse
//! - No drain: connections already accepted are not waited for

pub mod managed;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use managed::{LifecycleEnvironment, Managed};
pub use shutdown::Shutdown;
pub use startup::{
    Application, Bootstrap, Bundle, CheckCommand, ConfigurationFactory, FileConfigurationFactory,
    ServerCommand,
};
