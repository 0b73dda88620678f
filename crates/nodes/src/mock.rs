//! `MockNode`: a test double for `ExecutableNode`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::port::{NodeMetadata, Port, PortDecl};
use crate::value::SemanticValue;
use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

/// Shared, ordered record of node ids as they start executing.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return these output ports.
    ReturnPorts(Vec<Port>),
    /// Fail with this error.
    Fail(NodeError),
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    pub metadata: NodeMetadata,
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// All input sets seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<Vec<Port>>>>,
    log: Option<ExecutionLog>,
}

impl MockNode {
    /// Create a mock that always succeeds with the given ports.
    pub fn returning(name: impl Into<String>, metadata: NodeMetadata, ports: Vec<Port>) -> Self {
        Self {
            name: name.into(),
            metadata,
            behaviour: MockBehaviour::ReturnPorts(ports),
            calls: Arc::new(Mutex::new(Vec::new())),
            log: None,
        }
    }

    /// Create a mock that always fails with `error`.
    pub fn failing(name: impl Into<String>, metadata: NodeMetadata, error: NodeError) -> Self {
        Self {
            name: name.into(),
            metadata,
            behaviour: MockBehaviour::Fail(error),
            calls: Arc::new(Mutex::new(Vec::new())),
            log: None,
        }
    }

    /// A source node with a single boolean signal output named `signal`.
    pub fn signal(name: impl Into<String>, label: &str, value: bool) -> Self {
        Self::returning(
            name,
            NodeMetadata::new(vec![], vec![PortDecl::required("signal", label)]),
            vec![Port::new("signal", SemanticValue::primitive(label, value))],
        )
    }

    /// Append the executing node id to `log` on every call.
    pub fn with_log(mut self, log: &ExecutionLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Inputs of the most recent call.
    pub fn last_inputs(&self) -> Option<Vec<Port>> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    fn metadata(&self) -> NodeMetadata {
        self.metadata.clone()
    }

    async fn execute(&self, inputs: Vec<Port>, ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(ctx.node_id.clone());
        }
        self.calls.lock().unwrap().push(inputs);

        match &self.behaviour {
            MockBehaviour::ReturnPorts(ports) => Ok(ports.clone()),
            MockBehaviour::Fail(err) => Err(err.clone()),
        }
    }
}

/// A `MockNode` can be shared between a vessel and the test that inspects it.
#[async_trait]
impl ExecutableNode for Arc<MockNode> {
    fn metadata(&self) -> NodeMetadata {
        self.as_ref().metadata()
    }

    async fn execute(&self, inputs: Vec<Port>, ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        self.as_ref().execute(inputs, ctx).await
    }
}
