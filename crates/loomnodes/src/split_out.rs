use async_trait::async_trait;
use loomcore::value::{parse_path, remove_path, JsonObject, PathSegment, Value};
use loomcore::{Item, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput, Property};

/// Turns one item holding an array into one item per element.
pub struct SplitOutNode;

#[async_trait]
impl NodeBehavior for SplitOutNode {
    fn describe(&self) -> NodeDescriptor {
        NodeDescriptor::new("splitOut", "Split Out")
            .with_description("Turns a list inside an item into separate items")
            .with_property(
                Property::string("fieldToSplitOut", "Field To Split Out", "")
                    .required()
                    .describe("Dot path of the array to split"),
            )
            .with_property(Property::options(
                "include",
                "Include",
                "noOtherFields",
                &[
                    ("No Other Fields", "noOtherFields"),
                    ("All Other Fields", "allOtherFields"),
                ],
            ))
            .with_property(
                Property::string("destinationFieldName", "Destination Field Name", "")
                    .describe("Field to write each element to; defaults to the split field"),
            )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut results = Vec::new();

        for (i, item) in ctx.items.iter().enumerate() {
            let field = ctx.require_string("fieldToSplitOut", i)?;
            let Some(Value::Array(elements)) = item.get(&field) else {
                ctx.events
                    .info(format!("Field '{}' is not a list, passing item through", field));
                results.push(Item::new(item.json.clone(), results.len()));
                continue;
            };

            let keep_others = ctx.get_string("include", i) == "allOtherFields";
            let destination = ctx.get_string("destinationFieldName", i);
            let key = if destination.is_empty() {
                last_key(&field)
            } else {
                destination.clone()
            };
            let total = elements.len();

            for (index, element) in elements.iter().enumerate() {
                let mut json = if keep_others {
                    let mut others = item.json.clone();
                    remove_path(&mut others, &field);
                    others
                } else {
                    JsonObject::new()
                };
                match element {
                    Value::Object(fields) if destination.is_empty() => {
                        json.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    other => {
                        json.insert(key.clone(), other.clone());
                    }
                }
                json.insert("_splitIndex".to_string(), Value::from(index));
                json.insert("_splitTotal".to_string(), Value::from(total));
                results.push(Item::new(json, results.len()));
            }
        }

        Ok(NodeOutput::single(results))
    }
}

/// Final key of a dot path: `a.b[2].c` gives `c`.
fn last_key(path: &str) -> String {
    parse_path(path)
        .into_iter()
        .rev()
        .find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key),
            PathSegment::Index(_) => None,
        })
        .unwrap_or_else(|| path.to_string())
}
