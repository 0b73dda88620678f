//! Port declarations, runtime ports and node metadata.

use serde::{Deserialize, Serialize};

use crate::label::SemanticLabel;
use crate::value::SemanticValue;

/// Declared shape of an input or output port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    pub label: SemanticLabel,
    /// Optional inputs do not gate scheduling.
    #[serde(default)]
    pub optional: bool,
}

impl PortDecl {
    pub fn required(name: impl Into<String>, label: impl Into<SemanticLabel>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, label: impl Into<SemanticLabel>) -> Self {
        Self {
            optional: true,
            ..Self::required(name, label)
        }
    }
}

/// A port carrying (or not yet carrying) a value at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub label: SemanticLabel,
    pub value: Option<SemanticValue>,
}

impl Port {
    /// A port holding `value`; the port label is taken from the value.
    pub fn new(name: impl Into<String>, value: SemanticValue) -> Self {
        Self {
            name: name.into(),
            label: value.label.clone(),
            value: Some(value),
        }
    }

    pub fn empty(name: impl Into<String>, label: impl Into<SemanticLabel>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            value: None,
        }
    }
}

/// Find a port by name in a port list.
pub fn find_port<'a>(ports: &'a [Port], name: &str) -> Option<&'a Port> {
    ports.iter().find(|p| p.name == name)
}

/// Declared concurrency of a node type.  Only informational: the scheduler
/// always runs one node at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Concurrent,
}

/// Port shapes of a node type, as reported by its vessel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub inputs: Vec<PortDecl>,
    pub outputs: Vec<PortDecl>,
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl NodeMetadata {
    pub fn new(inputs: Vec<PortDecl>, outputs: Vec<PortDecl>) -> Self {
        Self {
            inputs,
            outputs,
            mode: ExecutionMode::Sequential,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn input(&self, name: &str) -> Option<&PortDecl> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDecl> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn declares_input(&self, name: &str) -> bool {
        self.input(name).is_some()
    }
}
