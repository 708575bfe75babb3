use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors local to a single node invocation. The engine catches these at the
/// node boundary, logs them and stops the failing branch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required parameter: {parameter}")]
    MissingRequiredParameter { parameter: String },

    #[error("Invalid value for parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("Condition evaluation failed: {0}")]
    ConditionEvaluation(String),

    #[error("Conversion failed for '{field}': {reason}")]
    Conversion { field: String, reason: String },

    #[error("Invalid date in '{field}': {value}")]
    InvalidDate { field: String, value: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Expected {expected} output(s), behavior returned {actual}")]
    OutputMismatch { expected: usize, actual: usize },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Graph-level errors. These are the only failures that abort `run()` itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Workflow has no trigger node")]
    NoTrigger,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Cyclic dependency detected")]
    CyclicDependency,

    #[error("Invalid workflow: {0}")]
    Invalid(String),
}
