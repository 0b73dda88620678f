//! Engine-level error types.

use thiserror::Error;

use semflow_nodes::NodeError;

use crate::validator::ValidationError;

/// Errors produced by the engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// The graph failed static validation; no node was executed.
    #[error("graph failed validation with {} error(s): {}", .0.len(), summarize(.0))]
    Validation(Vec<ValidationError>),

    // ------ Execution errors ------

    /// A node's own logic failed; the whole run is aborted.
    #[error("node '{node_id}' ({vessel}.{node_type}) failed{}: {source}", port_suffix(.port))]
    NodeExecution {
        node_id: String,
        vessel: String,
        node_type: String,
        /// Port the node complained about, when it named one.
        port: Option<String>,
        #[source]
        source: NodeError,
    },

    /// The registry has no implementation for the node's type.
    #[error("node '{node_id}': cannot resolve '{vessel}.{node_type}': {message}")]
    Configuration {
        node_id: String,
        vessel: String,
        node_type: String,
        message: String,
    },

    /// A node was scheduled before one of its data sources produced results.
    #[error("node '{node_id}' input '{input}' depends on '{source_node}', which has not run")]
    MissingDependency {
        node_id: String,
        input: String,
        source_node: String,
    },

    /// A source node finished without producing the port a connection reads.
    #[error("node '{node_id}' did not produce output '{port}'")]
    OutputNotProduced { node_id: String, port: String },
}

impl EngineError {
    /// The validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// The node id an execution error is attributed to.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::Validation(_) => None,
            Self::NodeExecution { node_id, .. }
            | Self::Configuration { node_id, .. }
            | Self::MissingDependency { node_id, .. }
            | Self::OutputNotProduced { node_id, .. } => Some(node_id),
        }
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn port_suffix(port: &Option<String>) -> String {
    port.as_ref()
        .map(|p| format!(" on port '{p}'"))
        .unwrap_or_default()
}
