//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::Configuration;
use crate::config::validation::{validate_config, ValidationErrors};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Configuration, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Configuration, ConfigError> {
    let config: Configuration = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[server.application_connectors]]\ntype = \"http\"\naddress = \"127.0.0.1:0\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.application_connectors[0].address, "127.0.0.1:0");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = parse_config("[server\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = parse_config("[[server.application_connectors]]\ntype = \"https\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
