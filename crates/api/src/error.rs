use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("rate limit exceeded, server asks to retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("request rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("cannot read upload file {path}: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Transient failures that the client retries with a fixed wait.
    /// Everything else is surfaced to the caller on the first occurrence.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RequestFailed(err) => !err.is_builder(),
            ApiError::RateLimitExceeded { .. } => true,
            ApiError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ApiError::AuthenticationFailed { .. } => {
                Some("Verify your API key on your Redmine account page (/my/account)")
            }
            ApiError::RateLimitExceeded { .. } => Some("Consider reducing request frequency"),
            ApiError::NotFound { .. } => Some("Check if the issue id is correct"),
            ApiError::Rejected { .. } => Some("Review the request parameters"),
            ApiError::Upload { .. } => Some("Check the file path and its permissions"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = ApiError::ServerError {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn rate_limit_is_retryable() {
        let err = ApiError::RateLimitExceeded { retry_after: 30 };
        assert!(err.is_retryable());
    }

    #[test]
    fn client_side_failures_are_terminal() {
        let rejected = ApiError::Rejected {
            status: 422,
            message: "validation failed".into(),
        };
        let auth = ApiError::AuthenticationFailed {
            message: "bad key".into(),
        };
        let not_found = ApiError::NotFound {
            resource: "/issues/9.json".into(),
        };
        let invalid = ApiError::InvalidArgument {
            message: "status out of range".into(),
        };
        assert!(!rejected.is_retryable());
        assert!(!auth.is_retryable());
        assert!(!not_found.is_retryable());
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn upload_error_carries_path() {
        let err = ApiError::Upload {
            path: PathBuf::from("/tmp/missing.fasta"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("/tmp/missing.fasta"));
        assert!(!err.is_retryable());
    }
}
