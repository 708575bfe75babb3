//! Standard node library
//!
//! Built-in node types: triggers, HTTP requests, field assignment, routing,
//! list reshaping, date handling and waits.

pub mod conditions;
mod date_time;
mod filter;
mod http;
mod if_node;
mod remove_duplicates;
mod set;
mod split_out;
mod switch;
mod trigger;
mod wait;

pub use date_time::{parse_date, DateTimeNode};
pub use filter::FilterNode;
pub use http::{HttpRequestNode, ReqwestTransport};
pub use if_node::IfNode;
pub use remove_duplicates::RemoveDuplicatesNode;
pub use set::SetNode;
pub use split_out::SplitOutNode;
pub use switch::SwitchNode;
pub use trigger::{TriggerKind, TriggerNode};
pub use wait::{WaitNode, WAIT_KEY};

use loomruntime::NodeRegistry;
use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    for kind in TriggerKind::ALL {
        registry.register_behavior(Arc::new(TriggerNode::new(kind)));
    }
    registry.register_behavior(Arc::new(HttpRequestNode));
    registry.register_behavior(Arc::new(SetNode));
    registry.register_behavior(Arc::new(IfNode));
    registry.register_behavior(Arc::new(SwitchNode));
    registry.register_behavior(Arc::new(FilterNode));
    registry.register_behavior(Arc::new(SplitOutNode));
    registry.register_behavior(Arc::new(RemoveDuplicatesNode));
    registry.register_behavior(Arc::new(DateTimeNode));
    registry.register_behavior(Arc::new(WaitNode));
}

/// A registry holding every standard node type.
pub fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);
    registry
}
