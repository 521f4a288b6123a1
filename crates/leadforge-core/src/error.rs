//! Core error types for LeadForge.
//!
//! `LeadforgeError` covers what the core crate can fail at; `ConfigError`
//! covers loading and saving `config.toml`.

use thiserror::Error;

/// Errors from the core crate itself: config, shared type parsing and I/O.
///
/// Subsystem crates keep their own error enums; the server maps each of them
/// to an HTTP response directly.
#[derive(Error, Debug)]
pub enum LeadforgeError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found (may be first run)
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `LeadforgeError`.
pub type Result<T> = std::result::Result<T, LeadforgeError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LeadforgeError::Validation("at least one search criterion is required".to_string());
        assert_eq!(
            err.to_string(),
            "validation error: at least one search criterion is required"
        );

        let err = ConfigError::InvalidValue {
            field: "server.bind".to_string(),
            reason: "missing port".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for server.bind: missing port"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let err: LeadforgeError = config_err.into();
        assert!(matches!(err, LeadforgeError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: LeadforgeError = io_err.into();
        assert!(matches!(err, LeadforgeError::Io(_)));
    }
}
