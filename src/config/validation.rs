//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - https connectors name both a certificate and a key
//! - Context paths are absolute
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Configuration → Result<(), ValidationErrors>
//! - File existence is not checked here; the connector reports unloadable
//!   keypairs when it starts

use std::path::Path;

use crate::config::schema::{Configuration, ConnectorSpec, ConnectorType};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: https connector requires {missing}")]
    MissingTlsFile {
        field: String,
        missing: &'static str,
    },

    #[error("{field}: context path must start with '/', got {value:?}")]
    RelativeContextPath { field: &'static str, value: String },
}

/// Every problem found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn validate_config(config: &Configuration) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    check_context_path(
        "server.application_context_path",
        &config.server.application_context_path,
        &mut errors,
    );
    check_context_path(
        "server.admin_context_path",
        &config.server.admin_context_path,
        &mut errors,
    );
    check_connectors(
        "server.application_connectors",
        &config.server.application_connectors,
        &mut errors,
    );
    check_connectors(
        "server.admin_connectors",
        &config.server.admin_connectors,
        &mut errors,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn check_context_path(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if !value.is_empty() && !value.starts_with('/') {
        errors.push(ValidationError::RelativeContextPath {
            field,
            value: value.to_string(),
        });
    }
}

fn check_connectors(field: &str, specs: &[ConnectorSpec], errors: &mut Vec<ValidationError>) {
    for (i, spec) in specs.iter().enumerate() {
        if spec.kind != ConnectorType::Https {
            continue;
        }
        if is_blank(spec.cert_file.as_deref()) {
            errors.push(ValidationError::MissingTlsFile {
                field: format!("{}[{}]", field, i),
                missing: "cert_file",
            });
        }
        if is_blank(spec.key_file.as_deref()) {
            errors.push(ValidationError::MissingTlsFile {
                field: format!("{}[{}]", field, i),
                missing: "key_file",
            });
        }
    }
}

fn is_blank(path: Option<&Path>) -> bool {
    path.map_or(true, |p| p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Configuration::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = Configuration::default();
        config.server.admin_context_path = "admin".into();
        config.server.application_connectors = vec![ConnectorSpec {
            kind: ConnectorType::Https,
            cert_file: Some("".into()),
            ..Default::default()
        }];

        let errors = validate_config(&config).unwrap_err().0;
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::MissingTlsFile {
            field: "server.application_connectors[0]".into(),
            missing: "key_file",
        }));
        assert!(matches!(
            errors[0],
            ValidationError::RelativeContextPath { field: "server.admin_context_path", .. }
        ));
    }

    #[test]
    fn message_lists_every_problem() {
        let mut config = Configuration::default();
        config.server.admin_context_path = "admin".into();
        config.server.application_context_path = "api".into();

        let message = validate_config(&config).unwrap_err().to_string();
        assert_eq!(
            message,
            "server.application_context_path: context path must start with '/', got \"api\", \
             server.admin_context_path: context path must start with '/', got \"admin\""
        );
    }

    #[test]
    fn https_with_both_files_is_valid() {
        let mut config = Configuration::default();
        config.server.admin_connectors = vec![ConnectorSpec::https(":8443", "c.pem", "k.pem")];
        assert!(validate_config(&config).is_ok());
    }
}
