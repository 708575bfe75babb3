use crate::value::{JsonObject, Value};
use serde::{Deserialize, Serialize};

pub type NodeId = String;

/// Key inside `NodeInstance::data` holding the free-form display label.
pub const LABEL_KEY: &str = "label";

/// Immutable graph snapshot handed to the engine for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeInstance>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeInstance) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect the default output of `source` to `target`.
    pub fn connect(&mut self, source: impl Into<String>, target: impl Into<String>) -> String {
        self.push_edge(source.into(), None, target.into())
    }

    /// Connect a named output (`"true"`, `"output2"`, ...) of `source` to `target`.
    pub fn connect_handle(
        &mut self,
        source: impl Into<String>,
        handle: impl Into<String>,
        target: impl Into<String>,
    ) -> String {
        self.push_edge(source.into(), Some(handle.into()), target.into())
    }

    fn push_edge(&mut self, source: String, handle: Option<String>, target: String) -> String {
        let id = format!("e{}-{}-{}", self.edges.len(), source, target);
        self.edges.push(Edge {
            id: id.clone(),
            source,
            target,
            source_handle: handle,
        });
        id
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Outgoing edges of `id`, in insertion order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Incoming edges of `id`, in insertion order.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }
}

/// A graph vertex: a node type plus its stored configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub data: JsonObject,
}

impl NodeInstance {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position: None,
            data: JsonObject::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.with_param(LABEL_KEY, label.into())
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.data.get(LABEL_KEY).and_then(Value::as_str)
    }

    /// Label if set, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.label().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(
        default,
        rename = "sourceHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
}

/// Node position in the visual editor. The engine ignores it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}
