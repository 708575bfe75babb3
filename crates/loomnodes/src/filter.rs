use crate::conditions::{condition_properties, item_matches};
use async_trait::async_trait;
use loomcore::{NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput};

/// Keeps the items that satisfy the conditions and drops the rest.
pub struct FilterNode;

#[async_trait]
impl NodeBehavior for FilterNode {
    fn describe(&self) -> NodeDescriptor {
        condition_properties().into_iter().fold(
            NodeDescriptor::new("filter", "Filter")
                .with_description("Keeps only items matching the conditions")
                .with_group("flow"),
            NodeDescriptor::with_property,
        )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let kept: Vec<_> = ctx
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| item_matches(&ctx, *i))
            .map(|(_, item)| item.clone())
            .collect();

        let dropped = ctx.items.len() - kept.len();
        if dropped > 0 {
            ctx.events.info(format!("Dropped {} item(s)", dropped));
        }
        Ok(NodeOutput::single(kept))
    }
}
