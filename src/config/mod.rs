//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Configuration (validated, immutable)
//!     → connector specs handed to the server factory
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Application-specific settings live in a free-form `[application]` table

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    Configuration, ConnectorSpec, ConnectorType, LogFormat, LoggingConfig, ServerConfig,
};
pub use validation::{validate_config, ValidationError, ValidationErrors};
