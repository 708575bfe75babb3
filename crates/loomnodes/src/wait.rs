use async_trait::async_trait;
use loomcore::value::Value;
use loomcore::{Item, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput, Property};
use serde_json::json;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

/// Key under which a webhook wait records its pending state on each item.
pub const WAIT_KEY: &str = "_wait";

/// Pauses the run for an interval, or marks the items as waiting for an
/// external resume call.
pub struct WaitNode;

fn unit_seconds(unit: &str) -> f64 {
    match unit {
        "minutes" => 60.0,
        "hours" => 3_600.0,
        "days" => 86_400.0,
        _ => 1.0,
    }
}

#[async_trait]
impl NodeBehavior for WaitNode {
    fn describe(&self) -> NodeDescriptor {
        let interval = [Value::from("timeInterval")];
        NodeDescriptor::new("wait", "Wait")
            .with_description("Waits before continuing with the execution")
            .with_group("flow")
            .with_property(Property::options(
                "resume",
                "Resume",
                "timeInterval",
                &[
                    ("After Time Interval", "timeInterval"),
                    ("On Webhook Call", "webhook"),
                ],
            ))
            .with_property(Property::number("amount", "Amount", 1.0).show_when("resume", &interval))
            .with_property(
                Property::options(
                    "unit",
                    "Unit",
                    "seconds",
                    &[
                        ("Seconds", "seconds"),
                        ("Minutes", "minutes"),
                        ("Hours", "hours"),
                        ("Days", "days"),
                    ],
                )
                .show_when("resume", &interval),
            )
            .with_property(
                Property::string("webhookSuffix", "Webhook Suffix", "")
                    .show_when("resume", &[Value::from("webhook")]),
            )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        if ctx.get_string("resume", 0) == "webhook" {
            let token = Uuid::new_v4().to_string();
            let suffix = ctx.get_string("webhookSuffix", 0);
            ctx.events.info(format!("Waiting for webhook call, resume token {}", token));

            let pending = ctx
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let mut json = item.json.clone();
                    json.insert(
                        WAIT_KEY.to_string(),
                        json!({"status": "pending", "resumeToken": token, "webhookSuffix": suffix}),
                    );
                    Item::new(json, i)
                })
                .collect();
            return Ok(NodeOutput::single(pending));
        }

        let seconds = (ctx.get_number("amount", 0) * unit_seconds(&ctx.get_string("unit", 0))).max(0.0);
        let duration = Duration::try_from_secs_f64(seconds).map_err(|e| NodeError::InvalidParameter {
            parameter: "amount".to_string(),
            reason: e.to_string(),
        })?;
        ctx.events.info(format!("Waiting {:?}", duration));

        tokio::select! {
            _ = sleep(duration) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        Ok(NodeOutput::single(ctx.items.clone()))
    }
}
