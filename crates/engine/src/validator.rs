//! Static graph validation: run this before executing a graph.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the graph.
//! 2. Every node's `(vessel, type)` must resolve in the registry.
//! 3. Every connection must reference existing nodes and declared ports.
//! 4. Every connection's source label must be compatible with its sink label.
//! 5. Required data connections must be acyclic (control edges may loop).
//!
//! All violations are collected and returned together unless the validator
//! runs in [`ValidationMode::FailFast`].  Validation never mutates the graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use semflow_nodes::label::SemanticLabel;

use crate::models::Graph;
use crate::registry::NodeRegistry;
use crate::topology::{classify, ConnectionKind};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Whether to report every violation or stop at the first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    #[default]
    CollectAll,
    FailFast,
}

/// Tuning knobs for the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub mode: ValidationMode,
    /// Follow conversion chains (`A -> B -> C` makes `A -> C` legal).
    pub transitive_conversions: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Which end of a connection a structural error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Sink,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Source => "source",
            Side::Sink => "sink",
        })
    }
}

/// Broad class of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The graph references something that does not exist.
    Structural,
    TypeMismatch,
    /// The registry cannot resolve a node implementation.
    Configuration,
}

/// One validation violation, with enough location detail to fix it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate node ID: '{node_id}'")]
    DuplicateNodeId { node_id: String },

    #[error("node '{node_id}' has unknown type '{vessel}.{node_type}'")]
    UnknownNodeType {
        node_id: String,
        vessel: String,
        node_type: String,
    },

    #[error("connection #{connection} references unknown {side} node '{node_id}'")]
    NodeNotFound {
        connection: usize,
        side: Side,
        node_id: String,
    },

    #[error("connection #{connection} references unknown {side} port '{node_id}.{port}'")]
    PortNotFound {
        connection: usize,
        side: Side,
        node_id: String,
        port: String,
    },

    #[error(
        "connection #{connection}: {source_node}.{source_port} ({source_label}) \
         cannot feed {sink_node}.{sink_port} ({sink_label})"
    )]
    TypeMismatch {
        connection: usize,
        source_node: String,
        source_port: String,
        source_label: SemanticLabel,
        sink_node: String,
        sink_port: String,
        sink_label: SemanticLabel,
    },

    #[error("required data connections form a cycle through: {}", .nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateNodeId { .. } => "DUPLICATE_NODE_ID",
            Self::UnknownNodeType { .. } => "CONFIGURATION_ERROR",
            Self::NodeNotFound { .. } => "NODE_NOT_FOUND",
            Self::PortNotFound { .. } => "PORT_NOT_FOUND",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::CycleDetected { .. } => "CYCLE_DETECTED",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TypeMismatch { .. } => ErrorCategory::TypeMismatch,
            Self::UnknownNodeType { .. } => ErrorCategory::Configuration,
            _ => ErrorCategory::Structural,
        }
    }
}

/// Accumulates violations; breaks early in fail-fast mode.
struct Violations {
    mode: ValidationMode,
    errors: Vec<ValidationError>,
}

impl Violations {
    fn record(&mut self, error: ValidationError) -> ControlFlow<()> {
        debug!(code = error.code(), "{error}");
        self.errors.push(error);
        match self.mode {
            ValidationMode::FailFast => ControlFlow::Break(()),
            ValidationMode::CollectAll => ControlFlow::Continue(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Validate `graph` against the registry.
///
/// # Errors
/// Every [`ValidationError`] found (only the first in fail-fast mode).
#[instrument(skip_all, fields(nodes = graph.nodes.len(), connections = graph.connections.len()))]
pub fn validate_graph(
    graph: &Graph,
    registry: &dyn NodeRegistry,
    config: &ValidatorConfig,
) -> Result<(), Vec<ValidationError>> {
    let mut violations = Violations {
        mode: config.mode,
        errors: Vec::new(),
    };

    let _ = run_checks(graph, registry, config, &mut violations);

    if violations.errors.is_empty() {
        debug!("graph is valid");
        Ok(())
    } else {
        warn!("graph rejected with {} violation(s)", violations.errors.len());
        Err(violations.errors)
    }
}

fn run_checks(
    graph: &Graph,
    registry: &dyn NodeRegistry,
    config: &ValidatorConfig,
    violations: &mut Violations,
) -> ControlFlow<()> {
    check_node_ids(graph, violations)?;
    check_node_types(graph, registry, violations)?;
    check_connections(graph, registry, config, violations)?;
    check_data_cycles(graph, registry, violations)
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_node_ids(graph: &Graph, violations: &mut Violations) -> ControlFlow<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            violations.record(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            })?;
        }
    }
    ControlFlow::Continue(())
}

fn check_node_types(
    graph: &Graph,
    registry: &dyn NodeRegistry,
    violations: &mut Violations,
) -> ControlFlow<()> {
    for node in &graph.nodes {
        if registry.node_metadata(&node.vessel_name, &node.type_name).is_none() {
            violations.record(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                vessel: node.vessel_name.clone(),
                node_type: node.type_name.clone(),
            })?;
        }
    }
    ControlFlow::Continue(())
}

fn check_connections(
    graph: &Graph,
    registry: &dyn NodeRegistry,
    config: &ValidatorConfig,
    violations: &mut Violations,
) -> ControlFlow<()> {
    for (index, conn) in graph.connections.iter().enumerate() {
        let source = graph.node(&conn.from.node);
        let sink = graph.node(&conn.to.node);

        if source.is_none() {
            violations.record(ValidationError::NodeNotFound {
                connection: index,
                side: Side::Source,
                node_id: conn.from.node.clone(),
            })?;
        }
        if sink.is_none() {
            violations.record(ValidationError::NodeNotFound {
                connection: index,
                side: Side::Sink,
                node_id: conn.to.node.clone(),
            })?;
        }

        // Unknown node types were already reported; nothing to resolve.
        let source_meta = source.and_then(|n| registry.node_metadata(&n.vessel_name, &n.type_name));
        let sink_meta = sink.and_then(|n| registry.node_metadata(&n.vessel_name, &n.type_name));

        let source_label = match source_meta {
            Some(meta) => match meta.output(&conn.from.output) {
                Some(decl) => Some(&decl.label),
                None => {
                    violations.record(ValidationError::PortNotFound {
                        connection: index,
                        side: Side::Source,
                        node_id: conn.from.node.clone(),
                        port: conn.from.output.clone(),
                    })?;
                    None
                }
            },
            None => None,
        };

        let sink_label = match sink_meta {
            Some(meta) => match meta.input(&conn.to.input) {
                Some(decl) => Some(&decl.label),
                None => {
                    violations.record(ValidationError::PortNotFound {
                        connection: index,
                        side: Side::Sink,
                        node_id: conn.to.node.clone(),
                        port: conn.to.input.clone(),
                    })?;
                    None
                }
            },
            None => None,
        };

        if let (Some(from), Some(to)) = (source_label, sink_label) {
            if !is_compatible(registry, from, to, config.transitive_conversions) {
                violations.record(ValidationError::TypeMismatch {
                    connection: index,
                    source_node: conn.from.node.clone(),
                    source_port: conn.from.output.clone(),
                    source_label: from.clone(),
                    sink_node: conn.to.node.clone(),
                    sink_port: conn.to.input.clone(),
                    sink_label: to.clone(),
                })?;
            }
        }
    }
    ControlFlow::Continue(())
}

/// Kahn's algorithm over required data connections between known nodes.
fn check_data_cycles(
    graph: &Graph,
    registry: &dyn NodeRegistry,
    violations: &mut Violations,
) -> ControlFlow<()> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in &graph.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }

    for conn in &graph.connections {
        let (Some(_), Some(sink)) = (graph.node(&conn.from.node), graph.node(&conn.to.node)) else {
            continue;
        };
        if classify(graph, registry, conn) == ConnectionKind::Control {
            continue;
        }
        let optional = registry
            .node_metadata(&sink.vessel_name, &sink.type_name)
            .and_then(|m| m.input(&conn.to.input))
            .is_some_and(|decl| decl.optional);
        if optional {
            continue;
        }

        adjacency
            .entry(conn.from.node.as_str())
            .or_default()
            .push(conn.to.node.as_str());
        *in_degree.entry(conn.to.node.as_str()).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();

    while let Some(node_id) = queue.pop_front() {
        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                if let Some(deg) = in_degree.get_mut(neighbour) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(neighbour);
                    }
                }
            }
        }
    }

    let mut stuck: HashSet<&str> = in_degree
        .into_iter()
        .filter(|(_, d)| *d > 0)
        .map(|(id, _)| id)
        .collect();

    // Undrained nodes merely downstream of a cycle have no edge back into it.
    loop {
        let downstream: Vec<&str> = stuck
            .iter()
            .copied()
            .filter(|id| {
                !adjacency
                    .get(id)
                    .is_some_and(|next| next.iter().any(|n| stuck.contains(n)))
            })
            .collect();
        if downstream.is_empty() {
            break;
        }
        for id in downstream {
            stuck.remove(id);
        }
    }

    if stuck.is_empty() {
        return ControlFlow::Continue(());
    }
    let mut nodes: Vec<String> = stuck.into_iter().map(str::to_owned).collect();
    nodes.sort();
    violations.record(ValidationError::CycleDetected { nodes })
}

// ---------------------------------------------------------------------------
// Compatibility
// ---------------------------------------------------------------------------

/// Can a value labelled `from` flow into a port declared `to`?
///
/// Identical labels always can.  Otherwise the vessel owning `from` must
/// list `to` among its conversion targets; with `transitive` set, chains of
/// declared conversions are followed.
pub fn is_compatible(
    registry: &dyn NodeRegistry,
    from: &SemanticLabel,
    to: &SemanticLabel,
    transitive: bool,
) -> bool {
    if from == to {
        return true;
    }
    if !transitive {
        return registry
            .vessel(from.vessel())
            .is_some_and(|v| v.can_convert(from, to));
    }

    let mut visited: HashSet<&SemanticLabel> = HashSet::from([from]);
    let mut queue: VecDeque<&SemanticLabel> = VecDeque::from([from]);
    while let Some(label) = queue.pop_front() {
        let Some(vessel) = registry.vessel(label.vessel()) else {
            continue;
        };
        for next in vessel.conversions_from(label) {
            if next == to {
                return true;
            }
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    false
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Connection, NodeInstance};
    use crate::registry::VesselRegistry;
    use semflow_nodes::mock::MockNode;
    use semflow_nodes::{NodeMetadata, PortDecl, Vessel};

    /// A vessel of label-only mock nodes: `Emit<T>` has output `out: test.T`,
    /// `Take<T>` has input `in: test.T`.
    fn typed_registry() -> VesselRegistry {
        let mut vessel = Vessel::new("test")
            .label("Int")
            .label("Bool")
            .label("UUID")
            .label("String")
            .label("Signal")
            .convertible("test.UUID", "test.String");
        for ty in ["Int", "Bool", "UUID", "String", "Signal"] {
            let label = format!("test.{ty}");
            vessel = vessel
                .node(
                    format!("Emit{ty}"),
                    MockNode::returning(
                        "emit",
                        NodeMetadata::new(vec![], vec![PortDecl::required("out", label.as_str())]),
                        vec![],
                    ),
                )
                .node(
                    format!("Take{ty}"),
                    MockNode::returning(
                        "take",
                        NodeMetadata::new(vec![PortDecl::required("in", label.as_str())], vec![]),
                        vec![],
                    ),
                );
        }
        vessel = vessel.node(
            "Loop",
            MockNode::returning(
                "loop",
                NodeMetadata::new(
                    vec![
                        PortDecl::required("in", "test.Int"),
                        PortDecl::optional("back", "test.Int"),
                    ],
                    vec![PortDecl::required("out", "test.Int")],
                ),
                vec![],
            ),
        );
        VesselRegistry::new().with_vessel(vessel)
    }

    fn node(id: &str, ty: &str) -> NodeInstance {
        NodeInstance::new(id, "test", ty)
    }

    fn pipe(from: &str, to: &str) -> Connection {
        Connection::new(from, "out", to, "in")
    }

    fn check(graph: &Graph) -> Result<(), Vec<ValidationError>> {
        validate_graph(graph, &typed_registry(), &ValidatorConfig::default())
    }

    #[test]
    fn identical_labels_validate() {
        let graph = Graph::new(
            vec![node("a", "EmitInt"), node("b", "TakeInt")],
            vec![pipe("a", "b")],
        );
        assert!(check(&graph).is_ok());
    }

    #[test]
    fn validation_is_idempotent_and_pure() {
        let graph = Graph::new(
            vec![node("a", "EmitUUID"), node("b", "TakeString")],
            vec![pipe("a", "b")],
        );
        let before = graph.clone();
        assert!(check(&graph).is_ok());
        assert!(check(&graph).is_ok());
        assert_eq!(graph, before);
    }

    #[test]
    fn int_into_bool_is_a_type_mismatch_naming_both_ends() {
        let graph = Graph::new(
            vec![node("num", "EmitInt"), node("flag", "TakeBool")],
            vec![pipe("num", "flag")],
        );
        let errors = check(&graph).unwrap_err();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ValidationError::TypeMismatch {
                source_node,
                source_port,
                source_label,
                sink_node,
                sink_port,
                sink_label,
                ..
            } => {
                assert_eq!((source_node.as_str(), source_port.as_str()), ("num", "out"));
                assert_eq!((sink_node.as_str(), sink_port.as_str()), ("flag", "in"));
                assert_eq!(source_label.as_str(), "test.Int");
                assert_eq!(sink_label.as_str(), "test.Bool");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
        assert_eq!(errors[0].code(), "TYPE_MISMATCH");
        assert_eq!(errors[0].category(), ErrorCategory::TypeMismatch);
    }

    #[test]
    fn conversion_is_directional() {
        let forward = Graph::new(
            vec![node("id", "EmitUUID"), node("s", "TakeString")],
            vec![pipe("id", "s")],
        );
        assert!(check(&forward).is_ok());

        let backward = Graph::new(
            vec![node("s", "EmitString"), node("id", "TakeUUID")],
            vec![pipe("s", "id")],
        );
        let errors = check(&backward).unwrap_err();
        assert!(matches!(errors[0], ValidationError::TypeMismatch { .. }));
    }

    #[test]
    fn collects_every_mismatch() {
        let graph = Graph::new(
            vec![
                node("i", "EmitInt"),
                node("s", "EmitString"),
                node("b1", "TakeBool"),
                node("u", "TakeUUID"),
                node("ok", "TakeInt"),
            ],
            vec![pipe("i", "b1"), pipe("s", "u"), pipe("i", "ok")],
        );
        let errors = check(&graph).unwrap_err();
        let connections: Vec<usize> = errors
            .iter()
            .filter_map(|e| match e {
                ValidationError::TypeMismatch { connection, .. } => Some(*connection),
                _ => None,
            })
            .collect();
        assert_eq!(connections, vec![0, 1]);
    }

    #[test]
    fn fail_fast_stops_at_first() {
        let graph = Graph::new(
            vec![node("i", "EmitInt"), node("b", "TakeBool"), node("u", "TakeUUID")],
            vec![pipe("i", "b"), pipe("i", "u")],
        );
        let config = ValidatorConfig {
            mode: ValidationMode::FailFast,
            ..ValidatorConfig::default()
        };
        let errors = validate_graph(&graph, &typed_registry(), &config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn structural_errors_are_not_type_errors() {
        let graph = Graph::new(
            vec![node("a", "EmitInt"), node("b", "TakeInt")],
            vec![
                pipe("a", "ghost"),
                Connection::new("a", "nope", "b", "in"),
                Connection::new("a", "out", "b", "nope"),
            ],
        );
        let errors = check(&graph).unwrap_err();
        let codes: Vec<_> = errors.iter().map(ValidationError::code).collect();
        assert_eq!(codes, vec!["NODE_NOT_FOUND", "PORT_NOT_FOUND", "PORT_NOT_FOUND"]);
        assert!(errors.iter().all(|e| e.category() == ErrorCategory::Structural));
        assert!(matches!(
            &errors[0],
            ValidationError::NodeNotFound { side: Side::Sink, node_id, .. } if node_id == "ghost"
        ));
    }

    #[test]
    fn unknown_node_type_is_a_configuration_error() {
        let graph = Graph::new(vec![NodeInstance::new("x", "test", "Nope")], vec![]);
        let errors = check(&graph).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category(), ErrorCategory::Configuration);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let graph = Graph::new(vec![node("a", "EmitInt"), node("a", "EmitInt")], vec![]);
        let errors = check(&graph).unwrap_err();
        assert!(matches!(
            &errors[0],
            ValidationError::DuplicateNodeId { node_id } if node_id == "a"
        ));
    }

    #[test]
    fn required_data_cycle_is_detected() {
        let graph = Graph::new(
            vec![node("x", "Loop"), node("y", "Loop")],
            vec![pipe("x", "y"), pipe("y", "x")],
        );
        let errors = check(&graph).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::CycleDetected {
                nodes: vec!["x".into(), "y".into()]
            }]
        );
    }

    #[test]
    fn nodes_downstream_of_a_cycle_are_not_reported() {
        let graph = Graph::new(
            vec![node("x", "Loop"), node("y", "Loop"), node("down", "Loop")],
            vec![pipe("x", "y"), pipe("y", "x"), pipe("y", "down")],
        );
        let errors = check(&graph).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::CycleDetected {
                nodes: vec!["x".into(), "y".into()]
            }]
        );
    }

    #[test]
    fn optional_back_edge_is_not_a_cycle() {
        let graph = Graph::new(
            vec![node("src", "EmitInt"), node("x", "Loop"), node("y", "Loop")],
            vec![
                pipe("src", "x"),
                pipe("x", "y"),
                Connection::new("y", "out", "x", "back"),
            ],
        );
        assert!(check(&graph).is_ok());
    }

    #[test]
    fn control_edges_may_loop() {
        let registry = VesselRegistry::with_builtins();
        let graph = Graph::new(
            vec![
                NodeInstance::new("a", "basic", "Relay"),
                NodeInstance::new("b", "basic", "Relay"),
            ],
            vec![
                Connection::new("a", "done", "b", "trigger"),
                Connection::new("b", "done", "a", "trigger"),
            ],
        );
        assert!(validate_graph(&graph, &registry, &ValidatorConfig::default()).is_ok());
    }

    #[test]
    fn transitive_conversions_are_opt_in() {
        let registry = VesselRegistry::new().with_vessel(
            Vessel::new("units")
                .convertible("units.Meter", "units.Length")
                .convertible("units.Length", "units.Quantity"),
        );
        let meter = SemanticLabel::new("units.Meter");
        let quantity = SemanticLabel::new("units.Quantity");

        assert!(!is_compatible(&registry, &meter, &quantity, false));
        assert!(is_compatible(&registry, &meter, &quantity, true));
        assert!(!is_compatible(&registry, &quantity, &meter, true));
    }
}
