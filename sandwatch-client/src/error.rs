//! Error types for the sandwatch client

use sandwatch_core::domain::error::{ErrorClass, JobError};
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that can occur when calling the analysis backend
///
/// Every call returns one of these instead of panicking; the lifecycle
/// tracker decides what each kind means for a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No response was received (connection refused, timeout, reset)
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered with a 4xx status (job not found, bad request)
    #[error("request rejected (status {status}): {message}")]
    ClientStatus {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Backend answered with a 5xx status
    #[error("backend error (status {status}): {message}")]
    ServerStatus {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Response body could not be understood
    #[error("malformed response: {0}")]
    Decode(String),

    /// Backend URL cannot address the endpoint
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Classify a non-success HTTP status
    ///
    /// Anything outside 4xx and 5xx (an unfollowed redirect, say) means the
    /// response is not one the status contract describes.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400..=499 => Self::ClientStatus { status, message },
            500..=599 => Self::ServerStatus { status, message },
            _ => Self::Decode(format!("unexpected status {}: {}", status, message)),
        }
    }

    /// Whether the same request may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ServerStatus { .. })
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ClientStatus { status: 404, .. })
    }

    pub fn class(&self) -> ErrorClass {
        if self.is_retryable() {
            ErrorClass::Transient
        } else {
            ErrorClass::Permanent
        }
    }

    /// Fold into the job-level error descriptor
    pub fn to_job_error(&self) -> JobError {
        JobError::new(self.class(), self.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
