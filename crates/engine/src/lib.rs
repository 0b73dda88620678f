//! `semflow-engine`: graph model, static validation and the dual-flow
//! execution engine.

pub mod error;
pub mod executor;
pub mod models;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod topology;
pub mod validator;

pub use error::EngineError;
pub use executor::{ExecutionOutcome, ExecutorConfig, GraphExecutor};
pub use models::{Connection, Graph, InputRef, NodeInstance, OutputRef};
pub use registry::{NodeRegistry, VesselRegistry};
pub use scheduler::{RunReport, Scheduler};
pub use validator::{validate_graph, ValidationError, ValidationMode, ValidatorConfig};
