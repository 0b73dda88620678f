//! Graph model: node instances and the connections between their ports.
//!
//! A graph is immutable once built.  Port shapes are not stored here; they
//! come from the registry via each node's `(vessel, type)` pair.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// NodeInstance
// ---------------------------------------------------------------------------

/// A single node in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInstance {
    /// Unique identifier within this graph (referenced by connections).
    pub id: String,
    /// Vessel providing the node type.
    #[serde(rename = "vessel")]
    pub vessel_name: String,
    /// Node type inside the vessel.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Static inputs merged into the node's input ports at execution time.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl NodeInstance {
    pub fn new(id: impl Into<String>, vessel: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vessel_name: vessel.into(),
            type_name: type_name.into(),
            parameters: Map::new(),
        }
    }

    /// Builder: set one static parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Source side of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    pub node: String,
    pub output: String,
}

/// Sink side of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    pub node: String,
    pub input: String,
}

/// Directed edge from one output port to one input port.  Fan-out is
/// expressed as several connections sharing a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub from: OutputRef,
    pub to: InputRef,
}

impl Connection {
    pub fn new(from_node: &str, output: &str, to_node: &str, input: &str) -> Self {
        Self {
            from: OutputRef {
                node: from_node.to_owned(),
                output: output.to_owned(),
            },
            to: InputRef {
                node: to_node.to_owned(),
                input: input.to_owned(),
            },
        }
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from.node, self.from.output, self.to.node, self.to.input
        )
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A complete graph definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<NodeInstance>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Graph {
    pub fn new(nodes: Vec<NodeInstance>, connections: Vec<Connection>) -> Self {
        Self { nodes, connections }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Connections whose sink is `id`.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.to.node == id)
    }

    /// Connections whose source is `id`.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.from.node == id)
    }
}
