//! Node-level error type.

use thiserror::Error;

/// Coarse classification of a [`NodeError`], used by callers to tell
/// bad inputs from broken logic from missing implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Runtime,
    Configuration,
}

/// Errors returned by a node's `execute` method (or by the registry when it
/// cannot find one to call).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// An input port was missing or held a value of the wrong shape.
    #[error("invalid input '{port}': {message}")]
    InvalidInput { port: String, message: String },

    /// The node's own logic failed.
    #[error("node failed: {0}")]
    Runtime(String),

    /// No implementation could be resolved for the requested node type.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl NodeError {
    pub fn invalid_input(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            port: port.into(),
            message: message.into(),
        }
    }

    pub fn missing_input(port: impl Into<String>) -> Self {
        Self::invalid_input(port, "no value provided")
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::Validation,
            Self::Runtime(_) => ErrorKind::Runtime,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The port this error is about, when there is one.
    pub fn port(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { port, .. } => Some(port),
            _ => None,
        }
    }
}
