//! Vessels: named collections of node types and label definitions.
//!
//! A [`VesselDescriptor`] owns the labels of its namespace together with the
//! directed conversion graph between them.  Conversions are an explicit
//! allow-list per source label: declaring `basic.UUID -> basic.String` says
//! nothing about the converse.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::label::SemanticLabel;
use crate::traits::ExecutableNode;

/// Label definitions and conversion rules of one vessel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselDescriptor {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeSet<SemanticLabel>,
    /// `source label -> labels it may flow into`.
    #[serde(default)]
    pub conversions: BTreeMap<SemanticLabel, BTreeSet<SemanticLabel>>,
}

impl VesselDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declare `<vessel>.<type_name>` and return the full label.
    pub fn define_label(&mut self, type_name: &str) -> SemanticLabel {
        let label = SemanticLabel::qualified(&self.name, type_name);
        self.labels.insert(label.clone());
        label
    }

    pub fn defines(&self, label: &SemanticLabel) -> bool {
        self.labels.contains(label)
    }

    /// Allow values labelled `from` to flow into ports declared `to`.
    pub fn allow_conversion(&mut self, from: impl Into<SemanticLabel>, to: impl Into<SemanticLabel>) {
        self.conversions.entry(from.into()).or_default().insert(to.into());
    }

    /// Direct (non-transitive) lookup in the conversion table.
    pub fn can_convert(&self, from: &SemanticLabel, to: &SemanticLabel) -> bool {
        self.conversions
            .get(from)
            .is_some_and(|targets| targets.contains(to))
    }

    /// Labels `from` converts to directly.
    pub fn conversions_from(&self, from: &SemanticLabel) -> impl Iterator<Item = &SemanticLabel> {
        self.conversions.get(from).into_iter().flatten()
    }
}

/// A vessel descriptor plus the implementations of its node types.
#[derive(Clone)]
pub struct Vessel {
    pub descriptor: VesselDescriptor,
    pub nodes: BTreeMap<String, Arc<dyn ExecutableNode>>,
}

impl Vessel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: VesselDescriptor::new(name),
            nodes: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Builder: define a label in this vessel's namespace.
    pub fn label(mut self, type_name: &str) -> Self {
        self.descriptor.define_label(type_name);
        self
    }

    /// Builder: allow a directed conversion.
    pub fn convertible(mut self, from: &str, to: &str) -> Self {
        self.descriptor.allow_conversion(from, to);
        self
    }

    /// Builder: register a node type implementation.
    pub fn node(mut self, type_name: impl Into<String>, node: impl ExecutableNode + 'static) -> Self {
        self.nodes.insert(type_name.into(), Arc::new(node));
        self
    }
}

impl std::fmt::Debug for Vessel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vessel")
            .field("descriptor", &self.descriptor)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .finish()
    }
}
