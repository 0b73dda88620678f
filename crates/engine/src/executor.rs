//! Graph execution entry points.
//!
//! `GraphExecutor` is the central orchestrator:
//! 1. Validates the graph (every violation at once) before anything runs.
//! 2. Runs the dual-flow scheduler over the validated graph.
//! 3. Reconciles terminal outputs into the public result map.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use semflow_nodes::SemanticValue;

use crate::models::Graph;
use crate::reconciler::reconcile;
use crate::registry::{NodeRegistry, VesselRegistry};
use crate::scheduler::Scheduler;
use crate::validator::{validate_graph, ValidationError, ValidatorConfig};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Run the validator before every execution.
    pub validate_before_run: bool,
    /// Require data readiness in addition to control readiness.
    pub enforce_data_readiness: bool,
    pub validator: ValidatorConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            validate_before_run: true,
            enforce_data_readiness: true,
            validator: ValidatorConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output of a completed execution
// ---------------------------------------------------------------------------

/// The result of running a full graph.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub run_id: Uuid,
    /// Terminal outputs keyed `"<nodeId>.<portName>"`.
    pub outputs: BTreeMap<String, SemanticValue>,
    /// Node ids in execution order.
    pub executed: Vec<String>,
    /// Nodes that never became ready.
    pub skipped: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// GraphExecutor
// ---------------------------------------------------------------------------

/// Validates and runs graphs against a shared registry.
///
/// The executor holds no per-run state; concurrent calls to
/// [`GraphExecutor::execute_graph`] each get their own scheduler state.
#[derive(Clone)]
pub struct GraphExecutor {
    registry: Arc<dyn NodeRegistry>,
    config: ExecutorConfig,
}

impl GraphExecutor {
    pub fn new(registry: Arc<dyn NodeRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    /// An executor over the built-in vessels with default settings.
    pub fn with_builtins() -> Self {
        Self::new(Arc::new(VesselRegistry::with_builtins()), ExecutorConfig::default())
    }

    pub fn registry(&self) -> &dyn NodeRegistry {
        self.registry.as_ref()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Statically check `graph`.
    ///
    /// # Errors
    /// Every violation found (see [`ValidatorConfig::mode`]).
    pub fn validate_graph(&self, graph: &Graph) -> Result<(), Vec<ValidationError>> {
        validate_graph(graph, self.registry.as_ref(), &self.config.validator)
    }

    /// Run `graph` and return its terminal outputs.
    ///
    /// # Errors
    /// [`EngineError::Validation`] if the graph is rejected (nothing runs),
    /// otherwise the first node failure.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn execute_graph(&self, graph: &Graph) -> Result<ExecutionOutcome, EngineError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();

        if self.config.validate_before_run {
            self.validate_graph(graph).map_err(EngineError::Validation)?;
            info!("graph validated: {} nodes, {} connections", graph.nodes.len(), graph.connections.len());
        } else {
            warn!("validation skipped by configuration");
        }

        let scheduler = Scheduler::new(graph, self.registry.as_ref())
            .enforce_data_readiness(self.config.enforce_data_readiness);

        let report = scheduler.run(run_id).await.map_err(|err| {
            error!("run {} failed: {}", run_id, err);
            err
        })?;

        let outputs = reconcile(graph, self.registry.as_ref(), scheduler.topology(), &report.results);
        info!("run {} produced {} terminal output(s)", run_id, outputs.len());

        Ok(ExecutionOutcome {
            run_id,
            outputs,
            executed: report.executed,
            skipped: report.skipped,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
