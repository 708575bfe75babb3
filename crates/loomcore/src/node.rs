use crate::events::EventEmitter;
use crate::expression::Scope;
use crate::parameters::NodeParameters;
use crate::schema::NodeDescriptor;
use crate::services::Services;
use crate::value::{display_string, to_bool, to_number, JsonObject, Value};
use crate::{Item, NodeError, NodeId};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Behavior of one node type. Implemented once per type and registered at
/// startup.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    /// Schema and shape of the node type.
    fn describe(&self) -> NodeDescriptor;

    /// Run the node over its input items. Must return exactly
    /// `describe().output_count` item arrays.
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Execution context passed to each node invocation.
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,

    /// Input items for this invocation.
    pub items: Vec<Item>,

    /// Compiled configuration of the node.
    pub parameters: Arc<NodeParameters>,

    /// Writes node-scoped messages to the execution log.
    pub events: EventEmitter,

    /// HTTP transport and credential lookup.
    pub services: Services,

    /// Fires when the caller abandons the run.
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(node_id: impl Into<NodeId>, parameters: Arc<NodeParameters>, items: Vec<Item>) -> Self {
        let node_id = node_id.into();
        Self {
            events: EventEmitter::detached(node_id.clone()),
            node_id,
            items,
            parameters,
            services: Services::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    fn scope(&self, item_index: usize) -> Scope<'_> {
        Scope::new(self.items.get(item_index).map(|i| &i.json), item_index)
    }

    /// Resolved value of `name` for item `item_index`; `null` when neither a
    /// stored value nor a default exists.
    pub fn parameter(&self, name: &str, item_index: usize) -> Value {
        self.parameter_or(name, item_index, Value::Null)
    }

    pub fn parameter_or(&self, name: &str, item_index: usize, fallback: Value) -> Value {
        self.parameters.resolve(name, &self.scope(item_index), fallback)
    }

    pub fn get_string(&self, name: &str, item_index: usize) -> String {
        display_string(&self.parameter(name, item_index))
    }

    pub fn get_number(&self, name: &str, item_index: usize) -> f64 {
        to_number(&self.parameter(name, item_index)).unwrap_or(0.0)
    }

    pub fn get_bool(&self, name: &str, item_index: usize) -> bool {
        to_bool(&self.parameter(name, item_index)).unwrap_or(false)
    }

    /// Like [`get_string`](Self::get_string) but blank values are an error.
    pub fn require_string(&self, name: &str, item_index: usize) -> Result<String, NodeError> {
        let value = self.get_string(name, item_index);
        if value.trim().is_empty() {
            return Err(NodeError::MissingRequiredParameter {
                parameter: name.to_string(),
            });
        }
        Ok(value)
    }

    /// Instances of one group of a fixed collection, e.g.
    /// `collection("headerParameters", "parameters", i)`. Sub-properties are
    /// resolved for item `item_index` with defaults filled in.
    pub fn collection(&self, name: &str, group: &str, item_index: usize) -> Vec<JsonObject> {
        match self.parameter(name, item_index) {
            Value::Object(mut groups) => match groups.remove(group) {
                Some(Value::Array(instances)) => instances
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
                Some(Value::Object(single)) => vec![single],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

/// Output of one node invocation: one item array per declared output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOutput {
    pub outputs: Vec<Vec<Item>>,
}

impl NodeOutput {
    /// Output of a single-output node.
    pub fn single(items: Vec<Item>) -> Self {
        Self {
            outputs: vec![items],
        }
    }

    /// Output of a branching node, ordered by output index.
    pub fn branches(outputs: Vec<Vec<Item>>) -> Self {
        Self { outputs }
    }

    /// Items on output `index`, empty when the output does not exist.
    pub fn output(&self, index: usize) -> &[Item] {
        self.outputs.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn item_counts(&self) -> Vec<usize> {
        self.outputs.iter().map(Vec::len).collect()
    }
}
