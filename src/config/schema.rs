//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the harness.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Configuration {
    /// Connectors and context paths for both surfaces.
    pub server: ServerConfig,

    /// Log level and output format.
    pub logging: LoggingConfig,

    /// Free-form settings owned by the application.
    pub application: toml::Table,
}

impl Configuration {
    /// Deserialize the `[application]` table into the application's own type.
    pub fn application_section<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        toml::Value::Table(self.application.clone())
            .try_into()
            .map_err(ConfigError::Parse)
    }
}

/// Server configuration: one connector list per surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path prefix prepended to every application route.
    pub application_context_path: String,

    /// Path prefix prepended to every admin route.
    pub admin_context_path: String,

    pub application_connectors: Vec<ConnectorSpec>,

    pub admin_connectors: Vec<ConnectorSpec>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_context_path: "/".to_string(),
            admin_context_path: "/".to_string(),
            application_connectors: vec![ConnectorSpec::http(":8080")],
            admin_connectors: vec![ConnectorSpec::http(":8081")],
        }
    }
}

/// Transport used by a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    #[default]
    Http,
    Https,
}

impl ConnectorType {
    /// Port used when a connector has no address.
    pub fn default_port(self) -> u16 {
        match self {
            ConnectorType::Http => 80,
            ConnectorType::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectorType::Http => "http",
            ConnectorType::Https => "https",
        }
    }
}

/// One listener definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ConnectorSpec {
    #[serde(rename = "type")]
    pub kind: ConnectorType,

    /// Bind address (e.g., "127.0.0.1:8080" or ":8080"). Empty means the
    /// type's default port on all interfaces.
    pub address: String,

    /// Path to certificate chain (PEM), https only.
    pub cert_file: Option<PathBuf>,

    /// Path to private key (PEM), https only.
    pub key_file: Option<PathBuf>,
}

impl ConnectorSpec {
    pub fn http(address: impl Into<String>) -> Self {
        Self {
            kind: ConnectorType::Http,
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn https(
        address: impl Into<String>,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind: ConnectorType::Https,
            address: address.into(),
            cert_file: Some(cert_file.into()),
            key_file: Some(key_file.into()),
        }
    }

    /// The address handed to the socket layer.
    ///
    /// A missing host (":8080") binds all interfaces, and an empty address
    /// falls back to the port implied by the connector type.
    pub fn bind_address(&self) -> String {
        let address = self.address.trim();
        if address.is_empty() {
            format!("0.0.0.0:{}", self.kind.default_port())
        } else if let Some(port) = address.strip_prefix(':') {
            format!("0.0.0.0:{}", port)
        } else {
            address.to_string()
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "server_harness=debug".
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
