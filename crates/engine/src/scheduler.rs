//! Dual-flow scheduler.
//!
//! A node runs once it is both *control-ready* and *data-ready*:
//!
//! - control-ready: it is an entry node (no incoming control connections and
//!   no `trigger` input), or it has received exactly as many `true` control
//!   signals as it has incoming control connections;
//! - data-ready: every required incoming data connection's source node has
//!   produced results.
//!
//! Ready nodes are drained from a FIFO work-list one at a time.  After each
//! node completes its control outputs are propagated and its data successors
//! are re-checked.  A node is admitted to the work-list at most once per run.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use semflow_nodes::port::find_port;
use semflow_nodes::{
    ExecutionContext, ExecutionMode, NodeError, Port, SemanticLabel, SemanticValue,
};

use crate::error::EngineError;
use crate::models::{Graph, NodeInstance};
use crate::registry::NodeRegistry;
use crate::topology::{declares_trigger, Topology};

/// What a finished run produced, before output reconciliation.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Output ports per executed node.
    pub results: HashMap<String, Vec<Port>>,
    /// Node ids in execution order.
    pub executed: Vec<String>,
    /// Graph nodes that never became ready, in graph order.
    pub skipped: Vec<String>,
}

/// Working state of one run.  Created fresh per run and dropped afterwards.
#[derive(Default)]
struct RunState<'g> {
    results: HashMap<&'g str, Vec<Port>>,
    ready: VecDeque<&'g str>,
    /// Nodes ever pushed onto `ready`.
    admitted: HashSet<&'g str>,
    /// Control-ready nodes (entry nodes plus activated ones).
    activated: HashSet<&'g str>,
    control_received: HashMap<&'g str, usize>,
    executed: Vec<&'g str>,
}

/// Executes one graph against a registry.
pub struct Scheduler<'g> {
    graph: &'g Graph,
    registry: &'g dyn NodeRegistry,
    topology: Topology<'g>,
    enforce_data_readiness: bool,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g Graph, registry: &'g dyn NodeRegistry) -> Self {
        Self {
            graph,
            registry,
            topology: Topology::build(graph, registry),
            enforce_data_readiness: true,
        }
    }

    /// When disabled, nodes are admitted on control readiness alone and a
    /// missing data source fails the run with
    /// [`EngineError::MissingDependency`].
    pub fn enforce_data_readiness(mut self, enforce: bool) -> Self {
        self.enforce_data_readiness = enforce;
        self
    }

    pub fn topology(&self) -> &Topology<'g> {
        &self.topology
    }

    /// Nodes that are control-ready without any upstream signal, in graph
    /// order.
    pub fn entry_nodes(&self) -> Vec<&'g str> {
        self.graph
            .nodes
            .iter()
            .filter(|n| {
                self.topology.control_expected(&n.id) == 0 && !declares_trigger(self.registry, n)
            })
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Run the graph to completion.
    ///
    /// # Errors
    /// The first node failure aborts the run; no partial results are
    /// returned.
    #[instrument(skip(self), fields(nodes = self.graph.nodes.len()))]
    pub async fn run(&self, run_id: Uuid) -> Result<RunReport, EngineError> {
        let mut state = RunState::default();

        let entries = self.entry_nodes();
        info!("starting run with {} entry node(s): {:?}", entries.len(), entries);
        state.activated.extend(entries);
        for node in &self.graph.nodes {
            self.admit(&mut state, node.id.as_str());
        }

        while let Some(node_id) = state.ready.pop_front() {
            let Some(node) = self.graph.node(node_id) else {
                warn!("ready node '{}' is not part of the graph; skipping", node_id);
                continue;
            };

            let outputs = self.execute(run_id, node, &state).await?;
            state.results.insert(node_id, outputs);
            state.executed.push(node_id);

            self.propagate_control(&mut state, node_id);
            for conn in self.topology.outgoing_data(node_id) {
                self.admit(&mut state, conn.to.node.as_str());
            }
        }

        let skipped: Vec<String> = self
            .graph
            .nodes
            .iter()
            .filter(|n| !state.results.contains_key(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        if !skipped.is_empty() {
            debug!("{} node(s) never became ready: {:?}", skipped.len(), skipped);
        }
        info!("run finished: {} executed, {} skipped", state.executed.len(), skipped.len());

        Ok(RunReport {
            results: state
                .results
                .into_iter()
                .map(|(id, ports)| (id.to_owned(), ports))
                .collect(),
            executed: state.executed.into_iter().map(str::to_owned).collect(),
            skipped,
        })
    }

    // -----------------------------------------------------------------------
    // Readiness
    // -----------------------------------------------------------------------

    fn data_ready(&self, state: &RunState<'g>, node_id: &str) -> bool {
        self.topology
            .incoming_data(node_id)
            .iter()
            .filter(|edge| edge.required)
            .all(|edge| state.results.contains_key(edge.conn.from.node.as_str()))
    }

    /// Push `node_id` onto the work-list if it is ready and has never been
    /// admitted before.
    fn admit(&self, state: &mut RunState<'g>, node_id: &'g str) {
        if state.admitted.contains(node_id) || !state.activated.contains(node_id) {
            return;
        }
        if self.enforce_data_readiness && !self.data_ready(state, node_id) {
            debug!("node '{}' is control-ready, waiting for data", node_id);
            return;
        }
        state.admitted.insert(node_id);
        state.ready.push_back(node_id);
    }

    /// Count `true` signals on this node's control outputs and activate
    /// targets whose threshold is met.
    fn propagate_control(&self, state: &mut RunState<'g>, node_id: &'g str) {
        for conn in self.topology.outgoing_control(node_id) {
            let fired = state
                .results
                .get(node_id)
                .and_then(|ports| find_port(ports, &conn.from.output))
                .and_then(|p| p.value.as_ref())
                .and_then(SemanticValue::as_bool)
                == Some(true);
            if !fired {
                debug!("signal {} did not fire", conn);
                continue;
            }

            let target = conn.to.node.as_str();
            let received = {
                let count = state.control_received.entry(target).or_insert(0);
                *count += 1;
                *count
            };
            let expected = self.topology.control_expected(target);
            debug!("node '{}' received signal {}/{}", target, received, expected);

            if expected > 0 && received == expected {
                state.activated.insert(target);
                self.admit(state, target);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    async fn execute(
        &self,
        run_id: Uuid,
        node: &'g NodeInstance,
        state: &RunState<'g>,
    ) -> Result<Vec<Port>, EngineError> {
        let metadata = self.registry.node_metadata(&node.vessel_name, &node.type_name);
        if metadata.is_some_and(|m| m.mode == ExecutionMode::Concurrent) {
            debug!("node '{}' is declared concurrent; running it sequentially", node.id);
        }

        let inputs = self.resolve_inputs(node, state)?;
        let ctx = ExecutionContext {
            run_id,
            node_id: node.id.clone(),
            vessel: node.vessel_name.clone(),
            node_type: node.type_name.clone(),
        };

        debug!(
            "executing node '{}' ({}.{}) with {} input(s)",
            node.id,
            node.vessel_name,
            node.type_name,
            inputs.len()
        );
        self.registry
            .execute_node(&node.vessel_name, &node.type_name, inputs, &ctx)
            .await
            .map_err(|err| {
                error!("node '{}' failed: {}", node.id, err);
                execution_error(node, err)
            })
    }

    /// Gather this node's inputs from its sources' cached outputs, then add
    /// static parameters for any input name no connection supplied.
    fn resolve_inputs(&self, node: &NodeInstance, state: &RunState<'g>) -> Result<Vec<Port>, EngineError> {
        let metadata = self.registry.node_metadata(&node.vessel_name, &node.type_name);
        let declared_label = |name: &str| metadata.and_then(|m| m.input(name)).map(|d| d.label.clone());

        let mut inputs: Vec<Port> = Vec::new();
        for edge in self.topology.incoming_data(&node.id) {
            let conn = edge.conn;

            let Some(ports) = state.results.get(conn.from.node.as_str()) else {
                if edge.required {
                    return Err(EngineError::MissingDependency {
                        node_id: node.id.clone(),
                        input: conn.to.input.clone(),
                        source_node: conn.from.node.clone(),
                    });
                }
                continue;
            };

            let Some(value) = find_port(ports, &conn.from.output).and_then(|p| p.value.clone()) else {
                if edge.required {
                    return Err(EngineError::OutputNotProduced {
                        node_id: conn.from.node.clone(),
                        port: conn.from.output.clone(),
                    });
                }
                continue;
            };

            let label = declared_label(conn.to.input.as_str()).unwrap_or_else(|| value.label.clone());
            inputs.push(Port {
                name: conn.to.input.clone(),
                label,
                value: Some(value),
            });
        }

        for (name, raw) in &node.parameters {
            if find_port(&inputs, name).is_some() {
                continue;
            }
            let label = declared_label(name.as_str()).unwrap_or_else(SemanticLabel::unknown);
            inputs.push(Port::new(name.clone(), SemanticValue::primitive(label, raw.clone())));
        }

        Ok(inputs)
    }
}

fn execution_error(node: &NodeInstance, err: NodeError) -> EngineError {
    match err {
        NodeError::Configuration(message) => EngineError::Configuration {
            node_id: node.id.clone(),
            vessel: node.vessel_name.clone(),
            node_type: node.type_name.clone(),
            message,
        },
        other => EngineError::NodeExecution {
            node_id: node.id.clone(),
            vessel: node.vessel_name.clone(),
            node_type: node.type_name.clone(),
            port: other.port().map(str::to_owned),
            source: other,
        },
    }
}
