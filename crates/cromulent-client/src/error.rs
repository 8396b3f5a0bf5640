//! Error types for the HTTP clients.

use serde_json::Value;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure other than an unreachable host
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned {status}: {message}")]
    Status { status: u16, url: String, message: String },

    /// Connection refused, DNS failure or timeout
    #[error("cannot reach {url}: {message}")]
    Unreachable { url: String, message: String },

    /// A credential environment variable is not set
    #[error("{env} environment variable not set")]
    MissingCredential { env: String },

    /// Billing service list has no service with this display name
    #[error("service '{0}' not found in the billing service list")]
    ServiceNotFound(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a local SKU list failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Classify a reqwest failure for `url`.
    pub fn from_request(url: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ClientError::Unreachable {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            ClientError::Http(err)
        }
    }

    /// Check if the server could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Unreachable { .. })
    }

    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Cromwell answers `{"status": "fail", "message": ...}`, Google APIs
/// `{"error": {"code": ..., "message": ...}}`; anything else is returned
/// as-is.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .get("message")
            .or_else(|| json.pointer("/error/message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.trim().to_string(),
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formats() {
        assert_eq!(
            error_message(r#"{"status": "fail", "message": "Unrecognized workflow ID: abc"}"#),
            "Unrecognized workflow ID: abc"
        );
        assert_eq!(
            error_message(r#"{"error": {"code": 403, "message": "The caller does not have permission"}}"#),
            "The caller does not have permission"
        );
        assert_eq!(error_message("  Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_status_accessor() {
        let err = ClientError::Status {
            status: 404,
            url: "http://localhost:8000/api/workflows/v1/x/status".into(),
            message: "not found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_unreachable());
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = ClientError::MissingCredential {
            env: "GCP_API_KEY".into(),
        };
        assert_eq!(err.to_string(), "GCP_API_KEY environment variable not set");
    }
}
