//! Output reconciliation: turn a run's cached ports into the graph's result.
//!
//! Only *terminal* outputs are reported, i.e. produced ports that no
//! connection reads.  Each lands under `"<nodeId>.<portName>"` with the label
//! declared by the node type.  Payloads that are JSON objects of
//! `{ "label", "value" }` entries are rebuilt into labelled composites.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use semflow_nodes::{Payload, Port, SemanticLabel, SemanticValue};

use crate::models::{Graph, NodeInstance};
use crate::registry::NodeRegistry;
use crate::topology::Topology;

/// Build the result map from per-node results.
pub fn reconcile(
    graph: &Graph,
    registry: &dyn NodeRegistry,
    topology: &Topology<'_>,
    results: &HashMap<String, Vec<Port>>,
) -> BTreeMap<String, SemanticValue> {
    let mut outputs = BTreeMap::new();

    for node in &graph.nodes {
        let Some(ports) = results.get(&node.id) else {
            continue;
        };
        for port in ports {
            if topology.is_consumed(&node.id, &port.name) {
                continue;
            }
            let Some(value) = &port.value else {
                debug!("terminal port {}.{} has no value", node.id, port.name);
                continue;
            };

            let label = declared_label(registry, node, &port.name);
            outputs.insert(format!("{}.{}", node.id, port.name), rebuild(label, value));
        }
    }

    outputs
}

/// Declared output label, or the `unknown` sentinel.
fn declared_label(registry: &dyn NodeRegistry, node: &NodeInstance, port: &str) -> SemanticLabel {
    registry
        .node_metadata(&node.vessel_name, &node.type_name)
        .and_then(|m| m.output(port))
        .map(|decl| decl.label.clone())
        .unwrap_or_else(|| {
            debug!("no declared label for {}.{}; using 'unknown'", node.id, port);
            SemanticLabel::unknown()
        })
}

/// Relabel `value` and normalise its payload into labelled composites.
pub fn rebuild(label: SemanticLabel, value: &SemanticValue) -> SemanticValue {
    let payload = match &value.value {
        Payload::Composite(fields) => Payload::Composite(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), rebuild(field.label.clone(), field)))
                .collect(),
        ),
        Payload::Primitive(json) => payload_of(json),
    };
    SemanticValue {
        label,
        value: payload,
        metadata: value.metadata.clone(),
    }
}

fn payload_of(json: &Value) -> Payload {
    nested_fields(json).map_or_else(|| Payload::Primitive(json.clone()), Payload::Composite)
}

/// `Some` iff `json` is a non-empty object whose every entry carries its
/// own `label` string and `value`.
fn nested_fields(json: &Value) -> Option<BTreeMap<String, SemanticValue>> {
    let object = json.as_object().filter(|o| !o.is_empty())?;
    object
        .iter()
        .map(|(name, entry)| {
            let entry = entry.as_object()?;
            let label = entry.get("label")?.as_str()?;
            let value = entry.get("value")?;
            let metadata = entry
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Some((
                name.clone(),
                SemanticValue {
                    label: SemanticLabel::new(label),
                    value: payload_of(value),
                    metadata,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Connection;
    use crate::registry::VesselRegistry;
    use semflow_nodes::mock::MockNode;
    use semflow_nodes::{NodeMetadata, PortDecl, Vessel};
    use serde_json::json;

    fn registry() -> VesselRegistry {
        VesselRegistry::new().with_vessel(
            Vessel::new("people").label("Person").node(
                "Make",
                MockNode::returning(
                    "make",
                    NodeMetadata::new(
                        vec![],
                        vec![
                            PortDecl::required("person", "people.Person"),
                            PortDecl::required("count", "basic.Int"),
                        ],
                    ),
                    vec![],
                ),
            ),
        )
    }

    fn graph() -> Graph {
        Graph::new(
            vec![
                NodeInstance::new("maker", "people", "Make"),
                NodeInstance::new("sink", "people", "Make"),
                NodeInstance::new("alien", "mars", "Probe"),
            ],
            vec![Connection::new("maker", "count", "sink", "count")],
        )
    }

    fn run(results: HashMap<String, Vec<Port>>) -> BTreeMap<String, SemanticValue> {
        let g = graph();
        let reg = registry();
        let topo = Topology::build(&g, &reg);
        reconcile(&g, &reg, &topo, &results)
    }

    #[test]
    fn only_unconsumed_ports_are_reported() {
        let results = HashMap::from([(
            "maker".to_owned(),
            vec![
                Port::new("person", SemanticValue::primitive("raw.Any", "x")),
                Port::new("count", SemanticValue::primitive("basic.Int", 1)),
            ],
        )]);
        let out = run(results);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["maker.person"]);
        // The declared label wins over the runtime one.
        assert_eq!(out["maker.person"].label.as_str(), "people.Person");
    }

    #[test]
    fn nested_json_is_rebuilt_into_composites() {
        let raw = json!({
            "name": { "label": "basic.String", "value": "Ada" },
            "address": {
                "label": "geo.Address",
                "value": {
                    "city": { "label": "basic.String", "value": "London" }
                },
                "metadata": { "verified": true }
            }
        });
        let results = HashMap::from([(
            "maker".to_owned(),
            vec![Port::new("person", SemanticValue::primitive("raw.Any", raw))],
        )]);
        let out = run(results);
        let person = &out["maker.person"];

        assert_eq!(person.field("name").unwrap().as_str(), Some("Ada"));
        let address = person.field("address").unwrap();
        assert_eq!(address.label.as_str(), "geo.Address");
        assert_eq!(address.metadata["verified"], json!(true));
        assert_eq!(address.field("city").unwrap().label.as_str(), "basic.String");
    }

    #[test]
    fn plain_objects_are_wrapped_as_is() {
        let raw = json!({ "name": "Ada", "age": { "label": "basic.Int" } });
        let results = HashMap::from([(
            "maker".to_owned(),
            vec![Port::new("person", SemanticValue::primitive("raw.Any", raw.clone()))],
        )]);
        let out = run(results);
        assert_eq!(out["maker.person"].as_json(), Some(&raw));
    }

    #[test]
    fn unresolvable_label_degrades_to_unknown() {
        let results = HashMap::from([(
            "alien".to_owned(),
            vec![
                Port::new("reading", SemanticValue::primitive("mars.Dust", 3)),
                Port::empty("silence", "mars.Dust"),
            ],
        )]);
        let out = run(results);
        assert_eq!(out.len(), 1);
        assert!(out["alien.reading"].label.is_unknown());
        assert_eq!(out["alien.reading"].as_json(), Some(&json!(3)));
    }

    #[test]
    fn metadata_survives_rebuild() {
        let value = SemanticValue::primitive("basic.Int", 7).with_metadata("unit", "kg");
        let rebuilt = rebuild(SemanticLabel::new("math.Number"), &value);
        assert_eq!(rebuilt.label.as_str(), "math.Number");
        assert_eq!(rebuilt.metadata["unit"], json!("kg"));
    }
}
