//! Error types for the platform client

use thiserror::Error;

/// Result type alias for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors that can occur when talking to the workload platform
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Request to the cluster API failed
    #[error("Kubernetes request failed: {0}")]
    Kube(#[from] kube::Error),

    /// Cluster credentials could not be loaded
    #[error("Failed to load cluster configuration: {0}")]
    Config(String),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A manifest could not be turned into a cluster object
    #[error("Invalid {kind} manifest '{name}': {source}")]
    InvalidManifest {
        kind: &'static str,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading a log stream failed
    #[error("Log stream failed: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::ApiError { status, .. } => *status == 404,
            Self::Kube(kube::Error::Api(response)) => response.code == 404,
            _ => false,
        }
    }

    /// Check if this error is a conflict, e.g. the resource already exists
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::ApiError { status, .. } => *status == 409,
            Self::Kube(kube::Error::Api(response)) => response.code == 409,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kube_api_error(code: u16, reason: &str) -> PlatformError {
        PlatformError::Kube(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("pods \"x\" {}", reason),
            reason: reason.to_string(),
            code,
        }))
    }

    #[test]
    fn test_not_found_classification() {
        assert!(PlatformError::NotFound("pod x".into()).is_not_found());
        assert!(PlatformError::api_error(404, "gone").is_not_found());
        assert!(kube_api_error(404, "NotFound").is_not_found());

        assert!(!PlatformError::api_error(500, "boom").is_not_found());
        assert!(!kube_api_error(403, "Forbidden").is_not_found());
        assert!(!PlatformError::Config("no context".into()).is_not_found());
    }

    #[test]
    fn test_conflict_classification() {
        assert!(kube_api_error(409, "AlreadyExists").is_conflict());
        assert!(PlatformError::api_error(409, "exists").is_conflict());
        assert!(!kube_api_error(404, "NotFound").is_conflict());
    }
}
