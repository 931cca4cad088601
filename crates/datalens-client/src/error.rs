//! Error types for the platform client.

use thiserror::Error;

/// Errors surfaced by the platform client.
///
/// Variants carry rendered messages rather than error sources so the type
/// stays `Clone`; results need to flow through the shared single-flight
/// futures where every waiter receives the same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend rejected the request with a non-success status.
    #[error("{message}")]
    Api {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Message extracted from the response body, or a fallback.
        message: String,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the configured client-side timeout.
    #[error("request timed out")]
    Timeout,

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Token refresh failed or no usable credentials remain.
    /// Terminal for the session: all tokens have been cleared.
    #[error("session expired, please log in again")]
    SessionExpired,

    /// The operation requires credentials that are not present.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Reading or writing a persisted state slot failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// Status code for API failures, if this error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this failure ended the session.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
