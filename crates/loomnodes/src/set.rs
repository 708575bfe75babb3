use async_trait::async_trait;
use loomcore::value::{display_string, set_path, JsonObject, Value};
use loomcore::{
    CollectionGroup, Item, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput,
    Property,
};

/// Value kinds the `values` collection accepts, in the order they are applied.
const VALUE_KINDS: [&str; 5] = ["boolean", "number", "string", "object", "array"];

/// Assigns typed values to fields of each item.
pub struct SetNode;

fn value_group(kind: &str, display_name: &str, value: Property) -> CollectionGroup {
    CollectionGroup::new(kind, display_name, vec![Property::string("name", "Name", ""), value])
}

/// Convert an assigned value to the declared kind.
fn convert(kind: &str, name: &str, value: Value) -> Result<Value, NodeError> {
    let structured = |expect_array: bool, value: Value| -> Result<Value, NodeError> {
        let parsed = match value {
            Value::String(text) if text.trim().is_empty() => {
                if expect_array {
                    Value::Array(Vec::new())
                } else {
                    Value::Object(JsonObject::new())
                }
            }
            Value::String(text) => serde_json::from_str(&text).map_err(|e| NodeError::Conversion {
                field: name.to_string(),
                reason: e.to_string(),
            })?,
            other => other,
        };
        match (expect_array, &parsed) {
            (true, Value::Array(_)) | (false, Value::Object(_)) => Ok(parsed),
            _ => Err(NodeError::Conversion {
                field: name.to_string(),
                reason: format!("expected {}, got {}", if expect_array { "array" } else { "object" }, parsed),
            }),
        }
    };

    match kind {
        "string" => Ok(match value {
            Value::String(_) => value,
            other => Value::String(display_string(&other)),
        }),
        "object" => structured(false, value),
        "array" => structured(true, value),
        // Numbers and booleans were coerced against the group schema.
        _ => Ok(value),
    }
}

#[async_trait]
impl NodeBehavior for SetNode {
    fn describe(&self) -> NodeDescriptor {
        NodeDescriptor::new("set", "Set")
            .with_description("Sets values on items and optionally removes other values")
            .with_property(
                Property::boolean("keepOnlySet", "Keep Only Set", false)
                    .describe("Drop every field that is not set by this node"),
            )
            .with_property(Property::fixed_collection(
                "values",
                "Values to Set",
                true,
                vec![
                    value_group("boolean", "Boolean", Property::boolean("value", "Value", false)),
                    value_group("number", "Number", Property::number("value", "Value", 0.0)),
                    value_group("string", "String", Property::string("value", "Value", "")),
                    value_group("object", "Object", Property::json("value", "Value", "{}")),
                    value_group("array", "Array", Property::json("value", "Value", "[]")),
                ],
            ))
            .with_property(
                Property::boolean("dotNotation", "Dot Notation", true)
                    .describe("Treat names like `a.b` as nested paths"),
            )
            .with_property(Property::boolean(
                "ignoreConversionErrors",
                "Ignore Type Conversion Errors",
                false,
            ))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut results = Vec::with_capacity(ctx.items.len());

        for (i, item) in ctx.items.iter().enumerate() {
            let mut json = if ctx.get_bool("keepOnlySet", i) {
                JsonObject::new()
            } else {
                item.json.clone()
            };
            let dot_notation = ctx.get_bool("dotNotation", i);
            let ignore_errors = ctx.get_bool("ignoreConversionErrors", i);

            for kind in VALUE_KINDS {
                for entry in ctx.collection("values", kind, i) {
                    let name = entry.get("name").map(display_string).unwrap_or_default();
                    if name.is_empty() {
                        tracing::debug!(node = %ctx.node_id, kind, "skipping value without a name");
                        continue;
                    }
                    let raw = entry.get("value").cloned().unwrap_or(Value::Null);
                    let value = match convert(kind, &name, raw) {
                        Ok(value) => value,
                        Err(_) if ignore_errors => continue,
                        Err(e) => return Err(e),
                    };
                    if dot_notation {
                        set_path(&mut json, &name, value);
                    } else {
                        json.insert(name, value);
                    }
                }
            }

            results.push(Item::new(json, i));
        }

        Ok(NodeOutput::single(results))
    }
}
