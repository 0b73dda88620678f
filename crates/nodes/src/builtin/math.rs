//! The `math` vessel: numeric constants and arithmetic.

use async_trait::async_trait;
use serde_json::{Number, Value};

use crate::port::{NodeMetadata, Port, PortDecl};
use crate::traits::{require_input, ExecutionContext, ExecutableNode};
use crate::value::SemanticValue;
use crate::vessel::Vessel;
use crate::NodeError;

pub const NUMBER: &str = "math.Number";

/// Build the `math` vessel.
pub fn vessel() -> Vessel {
    Vessel::new("math")
        .label("Number")
        .node("Constant", Constant)
        .node("Add", Binary::new(BinaryOp::Add))
        .node("Multiply", Binary::new(BinaryOp::Multiply))
        .node("GreaterThan", GreaterThan)
}

fn number_input(inputs: &[Port], name: &str) -> Result<Number, NodeError> {
    match require_input(inputs, name)?.as_json() {
        Some(Value::Number(n)) => Ok(n.clone()),
        other => Err(NodeError::invalid_input(
            name,
            format!("expected a number, got {}", other.map_or("a composite".to_owned(), Value::to_string)),
        )),
    }
}

/// Emits its `value` parameter as a `math.Number`.
pub struct Constant;

#[async_trait]
impl ExecutableNode for Constant {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(
            vec![PortDecl::optional("value", NUMBER)],
            vec![PortDecl::required("result", NUMBER)],
        )
    }

    async fn execute(&self, inputs: Vec<Port>, _ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        let n = number_input(&inputs, "value")?;
        Ok(vec![Port::new("result", SemanticValue::primitive(NUMBER, n))])
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Multiply,
}

impl BinaryOp {
    fn apply(self, x: &Number, y: &Number) -> Result<Number, NodeError> {
        // Stay integral when both sides are integers.
        if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
            let r = match self {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Multiply => a.checked_mul(b),
            };
            return r
                .map(Number::from)
                .ok_or_else(|| NodeError::Runtime(format!("integer overflow in {self:?}")));
        }

        let (a, b) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
        let r = match self {
            BinaryOp::Add => a + b,
            BinaryOp::Multiply => a * b,
        };
        Number::from_f64(r).ok_or_else(|| NodeError::Runtime(format!("{self:?} produced {r}")))
    }
}

/// `x <op> y -> result`.
pub struct Binary {
    op: BinaryOp,
}

impl Binary {
    pub fn new(op: BinaryOp) -> Self {
        Self { op }
    }
}

#[async_trait]
impl ExecutableNode for Binary {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(
            vec![PortDecl::required("x", NUMBER), PortDecl::required("y", NUMBER)],
            vec![PortDecl::required("result", NUMBER)],
        )
    }

    async fn execute(&self, inputs: Vec<Port>, _ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        let x = number_input(&inputs, "x")?;
        let y = number_input(&inputs, "y")?;
        let r = self.op.apply(&x, &y)?;
        Ok(vec![Port::new("result", SemanticValue::primitive(NUMBER, r))])
    }
}

/// `x > y` as a `basic.Bool`.
pub struct GreaterThan;

#[async_trait]
impl ExecutableNode for GreaterThan {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::new(
            vec![PortDecl::required("x", NUMBER), PortDecl::required("y", NUMBER)],
            vec![PortDecl::required("result", super::basic::BOOL)],
        )
    }

    async fn execute(&self, inputs: Vec<Port>, _ctx: &ExecutionContext) -> Result<Vec<Port>, NodeError> {
        let x = number_input(&inputs, "x")?.as_f64().unwrap_or(f64::NAN);
        let y = number_input(&inputs, "y")?.as_f64().unwrap_or(f64::NAN);
        Ok(vec![Port::new(
            "result",
            SemanticValue::primitive(super::basic::BOOL, x > y),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn num(name: &str, v: Value) -> Port {
        Port::new(name, SemanticValue::primitive(NUMBER, v))
    }

    #[tokio::test]
    async fn add_keeps_integers_integral() {
        let out = Binary::new(BinaryOp::Add)
            .execute(vec![num("x", json!(5)), num("y", json!(3))], &ExecutionContext::detached("add"))
            .await
            .unwrap();
        assert_eq!(out[0].value.as_ref().unwrap().as_json(), Some(&json!(8)));
    }

    #[tokio::test]
    async fn multiply_falls_back_to_floats() {
        let out = Binary::new(BinaryOp::Multiply)
            .execute(vec![num("x", json!(1.5)), num("y", json!(2))], &ExecutionContext::detached("mul"))
            .await
            .unwrap();
        assert_eq!(out[0].value.as_ref().unwrap().as_f64(), Some(3.0));
    }

    #[tokio::test]
    async fn missing_operand_is_a_validation_error() {
        let err = Binary::new(BinaryOp::Add)
            .execute(vec![num("x", json!(1))], &ExecutionContext::detached("add"))
            .await
            .unwrap_err();
        assert_eq!(err.port(), Some("y"));
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn overflow_is_a_runtime_error() {
        let err = Binary::new(BinaryOp::Add)
            .execute(
                vec![num("x", json!(i64::MAX)), num("y", json!(1))],
                &ExecutionContext::detached("add"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Runtime);
    }

    #[tokio::test]
    async fn constant_rejects_non_numbers() {
        let err = Constant
            .execute(
                vec![Port::new("value", SemanticValue::primitive("unknown", "five"))],
                &ExecutionContext::detached("c"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidInput { ref port, .. } if port == "value"));
    }

    #[test]
    fn constant_declares_its_parameter() {
        let meta = Constant.metadata();
        let value = meta.input("value").expect("value input declared");
        assert_eq!(value.label.as_str(), NUMBER);
        assert!(value.optional);
    }
}
