use async_trait::async_trait;
use chrono::Utc;
use loomcore::value::{JsonObject, Value};
use loomcore::{Item, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeOutput, Property};
use serde_json::json;

/// The ways a run can be started. All of them emit a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Manual,
    Schedule,
    Webhook,
    Workflow,
    Start,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 5] = [
        TriggerKind::Manual,
        TriggerKind::Schedule,
        TriggerKind::Webhook,
        TriggerKind::Workflow,
        TriggerKind::Start,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            TriggerKind::Manual => "manualTrigger",
            TriggerKind::Schedule => "scheduleTrigger",
            TriggerKind::Webhook => "webhookTrigger",
            TriggerKind::Workflow => "workflowTrigger",
            TriggerKind::Start => "start",
        }
    }

    fn default_payload(self) -> &'static str {
        match self {
            TriggerKind::Webhook => r#"{"headers": {}, "query": {}, "body": {}}"#,
            _ => "{}",
        }
    }
}

/// Entry node of a graph. Emits one item built from the configured `payload`
/// plus run metadata.
pub struct TriggerNode {
    kind: TriggerKind,
}

impl TriggerNode {
    pub fn new(kind: TriggerKind) -> Self {
        Self { kind }
    }

    fn payload(&self, ctx: &NodeContext) -> JsonObject {
        let configured = match ctx.parameter("payload", 0) {
            Value::String(text) if text.trim().is_empty() => Ok(Value::Object(JsonObject::new())),
            Value::String(text) => serde_json::from_str(&text),
            other => Ok(other),
        };
        match configured {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => JsonObject::new(),
            Ok(other) => Item::from_value(other, 0).json,
            Err(e) => {
                ctx.events
                    .info(format!("Payload is not valid JSON ({}), using default", e));
                serde_json::from_str(self.kind.default_payload()).unwrap_or_default()
            }
        }
    }
}

#[async_trait]
impl NodeBehavior for TriggerNode {
    fn describe(&self) -> NodeDescriptor {
        let descriptor = NodeDescriptor::new(self.kind.type_name(), display_name(self.kind)).trigger();
        let descriptor = match self.kind {
            TriggerKind::Schedule => descriptor
                .with_description("Starts the workflow on an interval")
                .with_property(Property::number("interval", "Interval", 1.0))
                .with_property(Property::options(
                    "unit",
                    "Unit",
                    "hours",
                    &[
                        ("Seconds", "seconds"),
                        ("Minutes", "minutes"),
                        ("Hours", "hours"),
                        ("Days", "days"),
                    ],
                )),
            TriggerKind::Webhook => descriptor
                .with_description("Starts the workflow when a webhook is called")
                .with_property(Property::options(
                    "httpMethod",
                    "HTTP Method",
                    "POST",
                    &[("GET", "GET"), ("POST", "POST"), ("PUT", "PUT"), ("DELETE", "DELETE")],
                ))
                .with_property(Property::string("path", "Path", "webhook")),
            TriggerKind::Workflow => {
                descriptor.with_description("Starts the workflow when called by another workflow")
            }
            TriggerKind::Manual | TriggerKind::Start => {
                descriptor.with_description("Starts the workflow on demand")
            }
        };
        descriptor.with_property(
            Property::json("payload", "Payload", self.kind.default_payload())
                .describe("JSON object emitted as the trigger item"),
        )
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mut json = self.payload(&ctx);

        match self.kind {
            TriggerKind::Schedule => {
                json.insert(
                    "schedule".to_string(),
                    json!({
                        "interval": ctx.parameter("interval", 0),
                        "unit": ctx.get_string("unit", 0),
                    }),
                );
            }
            TriggerKind::Webhook => {
                json.insert(
                    "webhook".to_string(),
                    json!({
                        "method": ctx.get_string("httpMethod", 0),
                        "path": ctx.get_string("path", 0),
                    }),
                );
            }
            _ => {}
        }
        json.insert("timestamp".to_string(), Value::from(Utc::now().to_rfc3339()));
        json.insert("trigger".to_string(), Value::from(self.kind.type_name()));

        ctx.events.info(format!("Triggered by {}", self.kind.type_name()));
        Ok(NodeOutput::single(vec![Item::new(json, 0)]))
    }
}

fn display_name(kind: TriggerKind) -> &'static str {
    match kind {
        TriggerKind::Manual => "Manual Trigger",
        TriggerKind::Schedule => "Schedule Trigger",
        TriggerKind::Webhook => "Webhook",
        TriggerKind::Workflow => "Execute Workflow Trigger",
        TriggerKind::Start => "Start",
    }
}
