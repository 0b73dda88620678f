//! `SemanticValue`: the typed envelope for every value crossing a node
//! boundary.
//!
//! A value is either a JSON primitive or a composite whose fields are
//! themselves labelled semantic values.  Composites carry no ambient typing:
//! each field brings its own label.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::label::SemanticLabel;

/// Payload of a [`SemanticValue`].
///
/// On the wire a composite is a JSON object of labelled values.  When
/// decoding, a non-empty object whose every entry parses as a
/// [`SemanticValue`] becomes a composite; anything else, including `{}`,
/// stays primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Named fields, each independently labelled.
    Composite(BTreeMap<String, SemanticValue>),
    /// Any JSON value.
    Primitive(Value),
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Value::deserialize(deserializer)?;
        let is_composite_shaped = json.as_object().is_some_and(|o| !o.is_empty());
        if is_composite_shaped {
            if let Ok(fields) = serde_json::from_value::<BTreeMap<String, SemanticValue>>(json.clone()) {
                return Ok(Payload::Composite(fields));
            }
        }
        Ok(Payload::Primitive(json))
    }
}

/// A labelled value with optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticValue {
    pub label: SemanticLabel,
    pub value: Payload,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl SemanticValue {
    pub fn new(label: impl Into<SemanticLabel>, value: Payload) -> Self {
        Self {
            label: label.into(),
            value,
            metadata: Map::new(),
        }
    }

    /// Wrap a JSON value.
    pub fn primitive(label: impl Into<SemanticLabel>, value: impl Into<Value>) -> Self {
        Self::new(label, Payload::Primitive(value.into()))
    }

    /// Build a composite from `(field, value)` pairs.
    pub fn composite<I, K>(label: impl Into<SemanticLabel>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, SemanticValue)>,
        K: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::new(label, Payload::Composite(fields))
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn label(&self) -> &SemanticLabel {
        &self.label
    }

    /// Wildcard match of this value's label, see [`SemanticLabel::matches`].
    pub fn matches(&self, pattern: &str) -> bool {
        self.label.matches(pattern)
    }

    /// Relabel the value, keeping payload and metadata.
    pub fn transform(self, label: impl Into<SemanticLabel>) -> Self {
        Self {
            label: label.into(),
            ..self
        }
    }

    /// Relabel the value and remap its payload through `f`.  Metadata is kept.
    pub fn transform_with<F>(self, label: impl Into<SemanticLabel>, f: F) -> Self
    where
        F: FnOnce(Payload) -> Payload,
    {
        Self {
            label: label.into(),
            value: f(self.value),
            metadata: self.metadata,
        }
    }

    /// A composite field by name.
    pub fn field(&self, name: &str) -> Option<&SemanticValue> {
        match &self.value {
            Payload::Composite(fields) => fields.get(name),
            Payload::Primitive(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match &self.value {
            Payload::Primitive(v) => Some(v),
            Payload::Composite(_) => None,
        }
    }

    /// The payload as a boolean, only for a primitive JSON `true`/`false`.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Value::as_bool)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(Value::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    /// Plain JSON view with labels stripped; composites become objects.
    pub fn to_plain_json(&self) -> Value {
        match &self.value {
            Payload::Primitive(v) => v.clone(),
            Payload::Composite(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
        }
    }
}
