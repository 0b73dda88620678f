//! Connection classification and per-node adjacency.
//!
//! A connection is a *control* connection iff the declared label of its
//! source output ends in `.Signal`.  When that label cannot be resolved the
//! source output's name decides (`signal`, `done`, `trigger`).

use std::collections::{HashMap, HashSet};

use semflow_nodes::label::SemanticLabel;

use crate::models::{Connection, Graph, NodeInstance};
use crate::registry::NodeRegistry;

/// Output names treated as control ports when labels are unavailable.
pub const CONTROL_PORT_NAMES: [&str; 3] = ["signal", "done", "trigger"];

/// Input port name that marks a node as waiting for explicit activation.
pub const TRIGGER_PORT: &str = "trigger";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Data,
    Control,
}

/// Declared label of `node.output`, if the registry knows it.
pub fn output_label<'r>(
    graph: &Graph,
    registry: &'r dyn NodeRegistry,
    node: &str,
    output: &str,
) -> Option<&'r SemanticLabel> {
    let node = graph.node(node)?;
    registry
        .node_metadata(&node.vessel_name, &node.type_name)?
        .output(output)
        .map(|p| &p.label)
}

/// Classify one connection.
pub fn classify(graph: &Graph, registry: &dyn NodeRegistry, conn: &Connection) -> ConnectionKind {
    let is_control = match output_label(graph, registry, &conn.from.node, &conn.from.output) {
        Some(label) => label.is_signal(),
        None => CONTROL_PORT_NAMES.contains(&conn.from.output.as_str()),
    };
    if is_control {
        ConnectionKind::Control
    } else {
        ConnectionKind::Data
    }
}

/// `true` if the node's type declares an input literally named `trigger`.
pub fn declares_trigger(registry: &dyn NodeRegistry, node: &NodeInstance) -> bool {
    registry
        .node_metadata(&node.vessel_name, &node.type_name)
        .is_some_and(|m| m.declares_input(TRIGGER_PORT))
}

/// An incoming data connection and whether it gates scheduling.
#[derive(Debug, Clone, Copy)]
pub struct DataEdge<'g> {
    pub conn: &'g Connection,
    /// `false` only when the sink declares the input optional.
    pub required: bool,
}

/// Classified adjacency of a graph, computed once per run.
#[derive(Debug, Default)]
pub struct Topology<'g> {
    incoming_data: HashMap<&'g str, Vec<DataEdge<'g>>>,
    outgoing_data: HashMap<&'g str, Vec<&'g Connection>>,
    outgoing_control: HashMap<&'g str, Vec<&'g Connection>>,
    control_expected: HashMap<&'g str, usize>,
    consumed: HashSet<(&'g str, &'g str)>,
}

impl<'g> Topology<'g> {
    pub fn build(graph: &'g Graph, registry: &dyn NodeRegistry) -> Self {
        let mut topo = Topology::default();

        for conn in &graph.connections {
            let from = conn.from.node.as_str();
            let to = conn.to.node.as_str();
            topo.consumed.insert((from, conn.from.output.as_str()));

            match classify(graph, registry, conn) {
                ConnectionKind::Control => {
                    topo.outgoing_control.entry(from).or_default().push(conn);
                    *topo.control_expected.entry(to).or_insert(0) += 1;
                }
                ConnectionKind::Data => {
                    let required = graph
                        .node(to)
                        .and_then(|n| registry.node_metadata(&n.vessel_name, &n.type_name))
                        .and_then(|m| m.input(&conn.to.input))
                        .map_or(true, |decl| !decl.optional);
                    topo.incoming_data
                        .entry(to)
                        .or_default()
                        .push(DataEdge { conn, required });
                    topo.outgoing_data.entry(from).or_default().push(conn);
                }
            }
        }

        topo
    }

    pub fn incoming_data(&self, node: &str) -> &[DataEdge<'g>] {
        self.incoming_data.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn outgoing_data(&self, node: &str) -> &[&'g Connection] {
        self.outgoing_data.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn outgoing_control(&self, node: &str) -> &[&'g Connection] {
        self.outgoing_control.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of incoming control connections.
    pub fn control_expected(&self, node: &str) -> usize {
        self.control_expected.get(node).copied().unwrap_or(0)
    }

    /// `true` if some connection reads `node.output`.
    pub fn is_consumed(&self, node: &str, output: &str) -> bool {
        self.consumed.contains(&(node, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeInstance;
    use crate::registry::VesselRegistry;

    fn graph() -> Graph {
        Graph::new(
            vec![
                NodeInstance::new("start", "basic", "Start"),
                NodeInstance::new("text", "basic", "Text").with_parameter("value", "hi"),
                NodeInstance::new("relay", "basic", "Relay"),
                NodeInstance::new("ghost", "nowhere", "Thing"),
            ],
            vec![
                Connection::new("start", "signal", "relay", "trigger"),
                Connection::new("text", "text", "relay", "value"),
                Connection::new("ghost", "done", "relay", "trigger"),
                Connection::new("ghost", "payload", "relay", "value"),
            ],
        )
    }

    #[test]
    fn signal_labels_make_control_connections() {
        let g = graph();
        let registry = VesselRegistry::with_builtins();
        assert_eq!(classify(&g, &registry, &g.connections[0]), ConnectionKind::Control);
        assert_eq!(classify(&g, &registry, &g.connections[1]), ConnectionKind::Data);
    }

    #[test]
    fn unresolved_labels_fall_back_to_port_names() {
        let g = graph();
        let registry = VesselRegistry::with_builtins();
        assert_eq!(classify(&g, &registry, &g.connections[2]), ConnectionKind::Control);
        assert_eq!(classify(&g, &registry, &g.connections[3]), ConnectionKind::Data);
    }

    #[test]
    fn topology_counts_and_flags() {
        let g = graph();
        let registry = VesselRegistry::with_builtins();
        let topo = Topology::build(&g, &registry);

        assert_eq!(topo.control_expected("relay"), 2);
        assert_eq!(topo.control_expected("start"), 0);
        assert_eq!(topo.outgoing_control("start").len(), 1);

        let data = topo.incoming_data("relay");
        assert_eq!(data.len(), 2);
        // `Relay.value` is declared optional.
        assert!(data.iter().all(|e| !e.required));

        assert!(topo.is_consumed("text", "text"));
        assert!(!topo.is_consumed("relay", "done"));
        assert!(declares_trigger(&registry, g.node("relay").unwrap()));
        assert!(!declares_trigger(&registry, g.node("start").unwrap()));
    }
}
