use loomcore::{NodeBehavior, NodeDescriptor, WorkflowError};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered node type: its descriptor and the behavior that executes it.
#[derive(Clone)]
pub struct RegisteredNode {
    pub descriptor: Arc<NodeDescriptor>,
    pub behavior: Arc<dyn NodeBehavior>,
}

/// Registry of available node types.
///
/// Populated at startup, then shared read-only behind an `Arc`.
pub struct NodeRegistry {
    types: HashMap<String, RegisteredNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Register `behavior` under `descriptor.name`. A later registration of
    /// the same name replaces the earlier one.
    pub fn register(&mut self, descriptor: NodeDescriptor, behavior: Arc<dyn NodeBehavior>) {
        let node_type = descriptor.name.clone();
        tracing::info!("Registering node type: {}", node_type);
        let previous = self.types.insert(
            node_type.clone(),
            RegisteredNode {
                descriptor: Arc::new(descriptor),
                behavior,
            },
        );
        if previous.is_some() {
            tracing::warn!("Node type {} was registered twice; keeping the latest", node_type);
        }
    }

    /// Register a behavior under the descriptor it describes itself with.
    pub fn register_behavior(&mut self, behavior: Arc<dyn NodeBehavior>) {
        let descriptor = behavior.describe();
        self.register(descriptor, behavior);
    }

    pub fn lookup(&self, node_type: &str) -> Result<&RegisteredNode, WorkflowError> {
        self.types
            .get(node_type)
            .ok_or_else(|| WorkflowError::UnknownNodeType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.types.contains_key(node_type)
    }

    /// All registered node type names, sorted.
    pub fn list_node_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptors of all registered types, sorted by name.
    pub fn list(&self) -> Vec<&NodeDescriptor> {
        let mut descriptors: Vec<&NodeDescriptor> =
            self.types.values().map(|r| r.descriptor.as_ref()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn get_descriptor(&self, node_type: &str) -> Option<&NodeDescriptor> {
        self.types.get(node_type).map(|r| r.descriptor.as_ref())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
