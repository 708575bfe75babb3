use super::log::{ExecutionLog, LogEntry};
use crate::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted during a run, for live observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: ExecutionId,
        graph: String,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        execution_id: ExecutionId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        execution_id: ExecutionId,
        node_id: NodeId,
        node_type: String,
        timestamp: DateTime<Utc>,
    },
    NodeCompleted {
        execution_id: ExecutionId,
        node_id: NodeId,
        /// Item count per output.
        item_counts: Vec<usize>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        execution_id: ExecutionId,
        node_id: NodeId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Log {
        entry: LogEntry,
    },
}

/// Node-scoped handle for writing to the execution log from inside a behavior.
#[derive(Clone)]
pub struct EventEmitter {
    node_id: NodeId,
    log: ExecutionLog,
}

impl EventEmitter {
    pub fn new(node_id: impl Into<NodeId>, log: ExecutionLog) -> Self {
        Self {
            node_id: node_id.into(),
            log,
        }
    }

    /// A handle whose messages go nowhere observable. Handy in unit tests.
    pub fn detached(node_id: impl Into<NodeId>) -> Self {
        Self::new(node_id, ExecutionLog::new())
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log.info(&self.node_id, message);
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

/// Broadcast channel for execution events.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn sender(&self) -> broadcast::Sender<ExecutionEvent> {
        self.sender.clone()
    }
}
