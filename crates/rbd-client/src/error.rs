//! Client errors.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias using [`ClientError`].
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by [`crate::CephBroker`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The broker address could not be used as a base URL.
    #[error("Invalid broker address: {0}")]
    InvalidAddress(String),

    /// Transport or decoding failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The broker answered with an unexpected status.
    #[error("Broker returned {status}: {message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Message from the response body.
        message: String,
    },
}

impl ClientError {
    /// HTTP status of a broker-side failure.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            Self::InvalidAddress(_) => None,
        }
    }
}
