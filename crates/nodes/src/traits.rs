//! The `ExecutableNode` trait: the contract every node must fulfil.

use async_trait::async_trait;
use uuid::Uuid;

use crate::port::{find_port, NodeMetadata, Port};
use crate::value::SemanticValue;
use crate::NodeError;

/// Context passed to every node during execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the current graph run.
    pub run_id: Uuid,
    /// ID of the node instance being executed.
    pub node_id: String,
    /// Vessel the node type belongs to.
    pub vessel: String,
    /// Node type name inside the vessel.
    pub node_type: String,
}

impl ExecutionContext {
    /// A context for calling a node outside of a graph run.
    pub fn detached(node_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            node_id: node_id.into(),
            vessel: String::new(),
            node_type: String::new(),
        }
    }
}

/// The core node trait.
///
/// Every node type registered in a vessel implements this.  Inputs arrive
/// as named ports (connected outputs plus static parameters); the node
/// returns its output ports.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Declared port shapes of this node type.
    fn metadata(&self) -> NodeMetadata;

    async fn execute(
        &self,
        inputs: Vec<Port>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Port>, NodeError>;
}

/// The value of input `name`, or [`NodeError::InvalidInput`] if absent.
pub fn require_input<'a>(inputs: &'a [Port], name: &str) -> Result<&'a SemanticValue, NodeError> {
    find_port(inputs, name)
        .and_then(|p| p.value.as_ref())
        .ok_or_else(|| NodeError::missing_input(name))
}

/// The value of input `name`, if one was supplied.
pub fn optional_input<'a>(inputs: &'a [Port], name: &str) -> Option<&'a SemanticValue> {
    find_port(inputs, name).and_then(|p| p.value.as_ref())
}
