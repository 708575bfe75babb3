use crate::conditions::{condition_properties, item_matches};
use async_trait::async_trait;
use loomcore::{Item, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput};

/// Routes each item to `true` (output 0) or `false` (output 1).
pub struct IfNode;

#[async_trait]
impl NodeBehavior for IfNode {
    fn describe(&self) -> NodeDescriptor {
        condition_properties().into_iter().fold(
            NodeDescriptor::new("if", "If")
                .with_description("Routes items to true or false based on conditions")
                .with_group("flow")
                .with_outputs(&["true", "false"]),
            NodeDescriptor::with_property,
        )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let (matched, unmatched): (Vec<_>, Vec<_>) = ctx
            .items
            .iter()
            .enumerate()
            .partition(|(i, _)| item_matches(&ctx, *i));

        ctx.events.info(format!(
            "{} item(s) true, {} item(s) false",
            matched.len(),
            unmatched.len()
        ));

        Ok(NodeOutput::branches(vec![owned(matched), owned(unmatched)]))
    }
}

fn owned(items: Vec<(usize, &Item)>) -> Vec<Item> {
    items.into_iter().map(|(_, item)| item.clone()).collect()
}
