use crate::conditions::{compare, Operator, OPERATOR_CHOICES};
use async_trait::async_trait;
use loomcore::value::{display_string, to_number, Value};
use loomcore::{
    CollectionGroup, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput, Property,
};

const OUTPUTS: [&str; 4] = ["output0", "output1", "output2", "output3"];

/// Routes each item to the output of the first rule its data field matches,
/// or to the fallback output.
pub struct SwitchNode;

/// Output index from a configured value, clamped to the declared outputs.
fn clamp_output(value: &Value) -> usize {
    let last = (OUTPUTS.len() - 1) as f64;
    to_number(value).unwrap_or(0.0).clamp(0.0, last) as usize
}

fn route(ctx: &NodeContext, i: usize) -> usize {
    let field = ctx.get_string("dataField", i);
    let value = ctx.items[i].get(&field).cloned().unwrap_or(Value::Null);
    let case_sensitive = ctx.get_bool("caseSensitive", i);

    for rule in ctx.collection("rules", "rule", i) {
        let operator = rule.get("operator").map(display_string).unwrap_or_default();
        let expected = rule.get("value").cloned().unwrap_or(Value::Null);
        let holds = operator
            .parse::<Operator>()
            .and_then(|op| compare(op, &value, &expected, case_sensitive));
        match holds {
            Ok(true) => return clamp_output(rule.get("output").unwrap_or(&Value::Null)),
            Ok(false) => {}
            Err(e) => tracing::warn!("Rule treated as no match: {}", e),
        }
    }
    clamp_output(&ctx.parameter("fallbackOutput", i))
}

#[async_trait]
impl NodeBehavior for SwitchNode {
    fn describe(&self) -> NodeDescriptor {
        NodeDescriptor::new("switch", "Switch")
            .with_description("Routes items to one of several outputs by rule")
            .with_group("flow")
            .with_outputs(&OUTPUTS)
            .with_property(
                Property::string("dataField", "Data Field", "")
                    .required()
                    .describe("Dot path of the value the rules compare"),
            )
            .with_property(Property::fixed_collection(
                "rules",
                "Routing Rules",
                true,
                vec![CollectionGroup::new(
                    "rule",
                    "Rule",
                    vec![
                        Property::options("operator", "Operation", "equals", OPERATOR_CHOICES),
                        Property::string("value", "Value", ""),
                        Property::number("output", "Output Index", 0.0),
                    ],
                )],
            ))
            .with_property(
                Property::number("fallbackOutput", "Fallback Output", 3.0)
                    .describe("Output for items no rule matches"),
            )
            .with_property(Property::boolean("caseSensitive", "Case Sensitive", true))
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut outputs = vec![Vec::new(); OUTPUTS.len()];
        for (i, item) in ctx.items.iter().enumerate() {
            outputs[route(&ctx, i)].push(item.clone());
        }

        let counts: Vec<String> = outputs.iter().map(|o| o.len().to_string()).collect();
        ctx.events.info(format!("Routed items per output: [{}]", counts.join(", ")));
        Ok(NodeOutput::branches(outputs))
    }
}
