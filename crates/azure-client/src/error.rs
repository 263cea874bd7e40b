//! Azure client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Azure Resource Manager API
#[derive(Debug, Error)]
pub enum AzureError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Azure API returned an error
    #[error("Azure API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body returned by Azure
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token acquisition failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Concurrent modification (HTTP 409 / 412)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request was throttled (HTTP 429)
    #[error("Throttled: {0}")]
    Throttled(String),

    /// A long running operation finished in a failed or canceled state
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl AzureError {
    /// Whether the error means the requested resource does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Whether the error is an optimistic concurrency conflict
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Api { status, .. } => *status == 409 || *status == 412,
            _ => false,
        }
    }

    /// Maps a non-success HTTP status to the matching error variant
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => Self::NotFound(message),
            409 | 412 => Self::Conflict(message),
            429 => Self::Throttled(message),
            401 | 403 => Self::Authentication(message),
            _ => Self::Api { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(AzureError::from_status(404, "disk etcd1".into()).is_not_found());
        assert!(AzureError::from_status(409, "etag".into()).is_conflict());
        assert!(AzureError::from_status(412, "etag".into()).is_conflict());
        assert!(matches!(AzureError::from_status(429, String::new()), AzureError::Throttled(_)));
        assert!(matches!(
            AzureError::from_status(500, "boom".into()),
            AzureError::Api { status: 500, .. }
        ));
        assert!(!AzureError::from_status(500, "boom".into()).is_not_found());
    }
}
