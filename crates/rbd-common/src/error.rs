//! Common error types for the RBD broker.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`BrokerError`].
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors produced by broker operations.
///
/// The variants separate input problems, absent targets and tool failures so
/// the HTTP layer can pick a status code without inspecting messages.
#[derive(Error, Diagnostic, Debug)]
pub enum BrokerError {
    /// Request rejected before any external command was issued.
    #[error("Invalid request: {message}")]
    #[diagnostic(code(rbd::validation))]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// The cluster reported that the image does not exist.
    #[error("RBD image not found: {image}")]
    #[diagnostic(code(rbd::image::not_found))]
    NotFound {
        /// The image that was not found.
        image: String,
    },

    /// An external command failed, could not be launched or timed out.
    #[error("{message}")]
    #[diagnostic(
        code(rbd::execution),
        help("Check that the rbd tool is installed and the cluster is reachable")
    )]
    Execution {
        /// The step that failed (create, map, format, ...).
        step: String,
        /// Description including the tool's output or launch error.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(rbd::config))]
    Config {
        /// The error message.
        message: String,
    },
}

impl BrokerError {
    /// Shorthand for a [`BrokerError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`BrokerError::Execution`].
    pub fn execution(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            step: step.into(),
            message: message.into(),
        }
    }
}
