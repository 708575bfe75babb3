//! Core abstractions for the loom workflow engine
//!
//! Items, graph snapshots, parameter schemas, the expression language, the
//! parameter resolver and the node behavior contract. Execution lives in
//! `loomruntime`; concrete node types live in `loomnodes`.

mod error;
pub mod events;
pub mod expression;
mod item;
mod node;
pub mod parameters;
pub mod schema;
pub mod services;
pub mod value;
mod workflow;

pub use error::{FlowError, NodeError, WorkflowError};
pub use events::*;
pub use item::{Item, PairedItem, SCALAR_KEY};
pub use node::{NodeBehavior, NodeContext, NodeOutput};
pub use parameters::NodeParameters;
pub use schema::{CollectionGroup, DisplayOptions, NodeDescriptor, Property, PropertyType, MAIN_OUTPUT};
pub use services::{
    CredentialStore, HttpBody, HttpRequest, HttpResponse, HttpTransport, NoCredentials, Services,
    SimulatedTransport, StaticCredentials,
};
pub use value::{JsonObject, Value};
pub use workflow::{Edge, Graph, NodeId, NodeInstance, Position, LABEL_KEY};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
