//! `semflow-nodes`: the semantic value model and the node contract.
//!
//! Every value crossing a node boundary is a labelled [`SemanticValue`];
//! every node type implements [`ExecutableNode`] and belongs to a
//! [`Vessel`], which also owns the label conversion rules of its namespace.

pub mod builtin;
pub mod error;
pub mod label;
pub mod mock;
pub mod port;
pub mod traits;
pub mod value;
pub mod vessel;

pub use error::{ErrorKind, NodeError};
pub use label::SemanticLabel;
pub use port::{ExecutionMode, NodeMetadata, Port, PortDecl};
pub use traits::{ExecutableNode, ExecutionContext};
pub use value::{Payload, SemanticValue};
pub use vessel::{Vessel, VesselDescriptor};
