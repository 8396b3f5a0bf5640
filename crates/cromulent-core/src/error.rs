//! Error types for cromulent setup operations.
//!
//! [`CoreError`] covers what can go wrong before an estimate starts:
//! locating and parsing the configuration file, and preparing the log
//! directory. Errors from the estimate itself live in `cromulent-cost`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while configuring a cromulent run.
#[derive(Debug, Error)]
pub enum CoreError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file is not valid YAML or has the wrong shape
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// A configuration value failed validation
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No home directory could be determined
    #[error("Could not determine the home directory")]
    NoHomeDirectory,
}

impl CoreError {
    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigInvalid { .. } | Self::ConfigValidation { .. })
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid { .. } => Some("Check the YAML syntax of ~/.cromulent/config.yaml"),
            Self::ConfigValidation { .. } => {
                Some("Fix the offending value in the config file or pass it on the command line")
            }
            Self::DirectoryCreation { .. } => Some("Pass --log-dir to write logs somewhere else"),
            Self::NoHomeDirectory => Some("Set HOME or pass --config and --log-dir explicitly"),
            _ => None,
        }
    }

    /// Create a user-friendly message for this error.
    pub fn friendly_message(&self) -> String {
        match self.guidance() {
            Some(hint) => format!("{} ({})", self, hint),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_invalid_error() {
        let err = CoreError::ConfigInvalid {
            path: "/home/user/.cromulent/config.yaml".into(),
            message: "expected a mapping".into(),
        };
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.is_config_error());
        assert!(err.guidance().is_some());
    }

    #[test]
    fn test_friendly_message_includes_guidance() {
        let err = CoreError::validation("unknown tier scheme 'cheap'");
        let msg = err.friendly_message();
        assert!(msg.contains("cheap"));
        assert!(msg.contains("command line"));
    }

    #[test]
    fn test_io_error_is_not_config_error() {
        let err = CoreError::io(
            "reading",
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_config_error());
        assert_eq!(err.friendly_message(), err.to_string());
    }
}
