use async_trait::async_trait;
use loomcore::value::{canonical_json, get_path, Value};
use loomcore::{Item, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput, Property};
use std::collections::{HashMap, HashSet};

/// Drops items whose comparison key was already seen.
pub struct RemoveDuplicatesNode;

impl RemoveDuplicatesNode {
    /// Comparison key of item `i`: the selected fields, or the whole payload
    /// when none are selected. Keys are canonical JSON so field order is
    /// irrelevant. Case folding touches string values only, never field names.
    fn key(&self, ctx: &NodeContext, i: usize) -> String {
        let item = &ctx.items[i];
        let fields: Vec<String> = if ctx.get_string("compare", i) == "selectedFields" {
            ctx.get_string("fieldsToCompare", i)
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect()
        } else {
            Vec::new()
        };

        let compared = if fields.is_empty() {
            Value::Object(item.json.clone())
        } else {
            Value::Array(
                fields
                    .iter()
                    .map(|f| get_path(&item.json, f).cloned().unwrap_or(Value::Null))
                    .collect(),
            )
        };

        if ctx.get_bool("caseSensitive", i) {
            canonical_json(&compared)
        } else {
            canonical_json(&lowercase_strings(compared))
        }
    }
}

fn lowercase_strings(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        Value::Array(elements) => Value::Array(elements.into_iter().map(lowercase_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, lowercase_strings(v)))
                .collect(),
        ),
        other => other,
    }
}

#[async_trait]
impl NodeBehavior for RemoveDuplicatesNode {
    fn describe(&self) -> NodeDescriptor {
        NodeDescriptor::new("removeDuplicates", "Remove Duplicates")
            .with_description("Removes items with matching field values")
            .with_property(Property::options(
                "compare",
                "Compare",
                "allFields",
                &[("All Fields", "allFields"), ("Selected Fields", "selectedFields")],
            ))
            .with_property(
                Property::string("fieldsToCompare", "Fields To Compare", "")
                    .describe("Comma-separated dot paths")
                    .show_when("compare", &[Value::from("selectedFields")]),
            )
            .with_property(Property::boolean("caseSensitive", "Case Sensitive", true))
            .with_property(Property::options(
                "keep",
                "Keep",
                "first",
                &[("First Occurrence", "first"), ("Last Occurrence", "last")],
            ))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let keys: Vec<String> = (0..ctx.items.len()).map(|i| self.key(&ctx, i)).collect();
        let keep_last = ctx.get_string("keep", 0) == "last";

        let kept: Vec<usize> = if keep_last {
            let mut last = HashMap::new();
            for (i, key) in keys.iter().enumerate() {
                last.insert(key.as_str(), i);
            }
            (0..keys.len()).filter(|i| last[keys[*i].as_str()] == *i).collect()
        } else {
            let mut seen = HashSet::new();
            (0..keys.len()).filter(|i| seen.insert(keys[*i].as_str())).collect()
        };

        let removed = ctx.items.len() - kept.len();
        ctx.events.info(format!("Removed {} duplicate item(s)", removed));

        let results = kept
            .into_iter()
            .enumerate()
            .map(|(position, i)| Item::new(ctx.items[i].json.clone(), position))
            .collect();
        Ok(NodeOutput::single(results))
    }
}
