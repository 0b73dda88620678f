//! The `basic` vessel: strings, identifiers, booleans and control signals.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::port::{NodeMetadata, Port, PortDecl};
use crate::traits::{optional_input, require_input, ExecutionContext, ExecutableNode};
use crate::value::SemanticValue;
use crate::vessel::Vessel;
use crate::NodeError;

pub const STRING: &str = "basic.String";
pub const INT: &str = "basic.Int";
pub const BOOL: &str = "basic.Bool";
pub const UUID: &str = "basic.UUID";
pub const SIGNAL: &str = "basic.Signal";

/// Build the `basic` vessel.
pub fn vessel() -> Vessel {
    Vessel::new("basic")
        .label("String")
        .label("Int")
        .label("Bool")
        .label("UUID")
        .label("Signal")
        .convertible(UUID, STRING)
        .convertible(INT, STRING)
        .node("Text", Text)
        .node("Uuid", NewUuid)
        .node("Concat", Concat)
        .node("Gate", Gate)
        .node("Start", Start)
        .node("Relay", Relay)
}

/// Render any semantic value as text.
fn text_of(value: &SemanticValue) -> String {
    match value.as_json() {
        Some(Value::String(s)) => s.clone(),
        _ => value.to_plain_json().to_string(),
    }
}

fn signal(name: &str, on: bool) -> Port {
    Port::new(name, SemanticValue::primitive(SIGNAL, on))
}

/// Emits its `value` parameter as `basic.String`.
pub struct Text;

#[async_trait]
impl ExecutableNode for Text {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(
            vec![PortDecl::optional("value", STRING)],
            vec![PortDecl::required("text", STRING)],
        )
    }

    async fn execute(&self, inputs: Vec<Port>, _ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        let text = text_of(require_input(&inputs, "value")?);
        Ok(vec![Port::new("text", SemanticValue::primitive(STRING, text))])
    }
}

/// Generates a fresh v4 identifier.
pub struct NewUuid;

#[async_trait]
impl ExecutableNode for NewUuid {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(vec![], vec![PortDecl::required("id", UUID)])
    }

    async fn execute(&self, _inputs: Vec<Port>, _ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        let id = Uuid::new_v4().to_string();
        Ok(vec![Port::new("id", SemanticValue::primitive(UUID, id))])
    }
}

/// `a ++ b`.
pub struct Concat;

#[async_trait]
impl ExecutableNode for Concat {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(
            vec![PortDecl::required("a", STRING), PortDecl::required("b", STRING)],
            vec![PortDecl::required("text", STRING)],
        )
    }

    async fn execute(&self, inputs: Vec<Port>, _ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        let a = text_of(require_input(&inputs, "a")?);
        let b = text_of(require_input(&inputs, "b")?);
        Ok(vec![Port::new("text", SemanticValue::primitive(STRING, a + &b))])
    }
}

/// Turns a boolean into a control signal.
pub struct Gate;

#[async_trait]
impl ExecutableNode for Gate {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(
            vec![PortDecl::required("value", BOOL)],
            vec![PortDecl::required("signal", SIGNAL)],
        )
    }

    async fn execute(&self, inputs: Vec<Port>, ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        let on = require_input(&inputs, "value")?
            .as_bool()
            .ok_or_else(|| NodeError::invalid_input("value", "expected a boolean"))?;
        debug!(node = %ctx.node_id, open = on, "gate evaluated");
        Ok(vec![signal("signal", on)])
    }
}

/// Always fires.
pub struct Start;

#[async_trait]
impl ExecutableNode for Start {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(vec![], vec![PortDecl::required("signal", SIGNAL)])
    }

    async fn execute(&self, _inputs: Vec<Port>, _ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        Ok(vec![signal("signal", true)])
    }
}

/// Waits for `trigger`, forwards its optional `value` and fires `done`.
pub struct Relay;

#[async_trait]
impl ExecutableNode for Relay {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(
            vec![
                PortDecl::required("trigger", SIGNAL),
                PortDecl::optional("value", STRING),
            ],
            vec![PortDecl::required("value", STRING), PortDecl::required("done", SIGNAL)],
        )
    }

    async fn execute(&self, inputs: Vec<Port>, ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        let value = match optional_input(&inputs, "value") {
            Some(v) => SemanticValue::primitive(STRING, text_of(v)),
            None => {
                debug!(node = %ctx.node_id, "relay triggered without a value");
                SemanticValue::primitive(STRING, Value::Null)
            }
        };
        Ok(vec![Port::new("value", value), signal("done", true)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::detached("t")
    }

    #[tokio::test]
    async fn concat_accepts_converted_identifiers() {
        let out = Concat
            .execute(
                vec![
                    Port::new("a", SemanticValue::primitive(STRING, "id-")),
                    Port::new("b", SemanticValue::primitive(INT, 7)),
                ],
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out[0].value.as_ref().unwrap().as_str(), Some("id-7"));
    }

    #[tokio::test]
    async fn gate_forwards_boolean_as_signal() {
        let out = Gate
            .execute(vec![Port::new("value", SemanticValue::primitive(BOOL, false))], &ctx())
            .await
            .unwrap();
        assert_eq!(out[0].label.as_str(), SIGNAL);
        assert_eq!(out[0].value.as_ref().unwrap().as_bool(), Some(false));
    }

    #[tokio::test]
    async fn gate_rejects_non_booleans() {
        let err = Gate
            .execute(vec![Port::new("value", SemanticValue::primitive(BOOL, "yes"))], &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.port(), Some("value"));
    }

    #[tokio::test]
    async fn uuid_output_parses() {
        let out = NewUuid.execute(vec![], &ctx()).await.unwrap();
        let id = out[0].value.as_ref().unwrap().as_str().unwrap().to_owned();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn vessel_declares_one_way_conversions() {
        let v = vessel();
        assert!(v.descriptor.can_convert(&UUID.into(), &STRING.into()));
        assert!(!v.descriptor.can_convert(&STRING.into(), &UUID.into()));
        assert_eq!(v.nodes.len(), 6);
    }

    #[test]
    fn text_declares_its_parameter() {
        let meta = Text.metadata();
        assert_eq!(meta.input("value").map(|d| d.label.as_str()), Some(STRING));
    }

    #[tokio::test]
    async fn relay_forwards_value_or_null() {
        let trigger = || Port::new("trigger", SemanticValue::primitive(SIGNAL, true));

        let out = Relay
            .execute(
                vec![trigger(), Port::new("value", SemanticValue::primitive(INT, 4))],
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out[0].value.as_ref().unwrap().as_str(), Some("4"));
        assert_eq!(out[1].value.as_ref().unwrap().as_bool(), Some(true));

        let out = Relay.execute(vec![trigger()], &ctx()).await.unwrap();
        assert_eq!(out[0].value.as_ref().unwrap().as_json(), Some(&Value::Null));
        assert_eq!(out[1].name, "done");
    }
}
