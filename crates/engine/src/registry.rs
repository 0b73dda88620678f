//! Node/type registry: the engine's only collaborator interface.
//!
//! The validator asks it for port metadata and conversion rules; the
//! scheduler asks it to run nodes.  [`VesselRegistry`] is the static
//! implementation: vessels are registered up front and looked up by
//! `(vessel, type)`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use semflow_nodes::{
    builtin, ExecutableNode, ExecutionContext, NodeError, NodeMetadata, Port, Vessel,
    VesselDescriptor,
};

/// Resolves node types and executes them.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Port shapes of `vessel.node_type`, if known.
    fn node_metadata(&self, vessel: &str, node_type: &str) -> Option<&NodeMetadata>;

    /// Label definitions and conversion rules of a vessel.
    fn vessel(&self, name: &str) -> Option<&VesselDescriptor>;

    /// Run one node.  An unknown node type fails with
    /// [`NodeError::Configuration`].
    async fn execute_node(
        &self,
        vessel: &str,
        node_type: &str,
        inputs: Vec<Port>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Port>, NodeError>;
}

/// A registration entry combining metadata with its implementation.
struct RegistryEntry {
    metadata: NodeMetadata,
    node: Arc<dyn ExecutableNode>,
}

/// Registry populated from [`Vessel`]s at construction time.
#[derive(Default)]
pub struct VesselRegistry {
    vessels: HashMap<String, VesselDescriptor>,
    entries: HashMap<(String, String), RegistryEntry>,
}

impl VesselRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `basic` and `math` vessels.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for vessel in builtin::vessels() {
            registry.register(vessel);
        }
        registry
    }

    /// Register a vessel and all its node types.  A vessel registered
    /// twice replaces the earlier one's descriptor; node types are merged.
    pub fn register(&mut self, vessel: Vessel) {
        let Vessel { descriptor, nodes } = vessel;
        debug!(vessel = %descriptor.name, node_types = nodes.len(), "registering vessel");

        for (type_name, node) in nodes {
            let metadata = node.metadata();
            self.entries.insert(
                (descriptor.name.clone(), type_name),
                RegistryEntry { metadata, node },
            );
        }
        self.vessels.insert(descriptor.name.clone(), descriptor);
    }

    /// Builder form of [`VesselRegistry::register`].
    pub fn with_vessel(mut self, vessel: Vessel) -> Self {
        self.register(vessel);
        self
    }

    pub fn has_node_type(&self, vessel: &str, node_type: &str) -> bool {
        self.entry(vessel, node_type).is_some()
    }

    /// All registered `(vessel, type)` pairs, sorted.
    pub fn node_types(&self) -> Vec<(&str, &str)> {
        let mut types: Vec<_> = self
            .entries
            .keys()
            .map(|(v, t)| (v.as_str(), t.as_str()))
            .collect();
        types.sort_unstable();
        types
    }

    fn entry(&self, vessel: &str, node_type: &str) -> Option<&RegistryEntry> {
        self.entries.get(&(vessel.to_owned(), node_type.to_owned()))
    }
}

#[async_trait]
impl NodeRegistry for VesselRegistry {
    fn node_metadata(&self, vessel: &str, node_type: &str) -> Option<&NodeMetadata> {
        self.entry(vessel, node_type).map(|e| &e.metadata)
    }

    fn vessel(&self, name: &str) -> Option<&VesselDescriptor> {
        self.vessels.get(name)
    }

    async fn execute_node(
        &self,
        vessel: &str,
        node_type: &str,
        inputs: Vec<Port>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Port>, NodeError> {
        let entry = self.entry(vessel, node_type).ok_or_else(|| {
            NodeError::Configuration(format!(
                "no implementation registered for '{vessel}.{node_type}'"
            ))
        })?;
        entry.node.execute(inputs, ctx).await
    }
}
