use super::base::ExecutionEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub seq: u64,
    pub node_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct LogState {
    entries: Vec<LogEntry>,
    next_seq: u64,
}

/// Ordered, append-only record of per-node events for one runtime.
///
/// Appends are serialized through one lock that also hands out the sequence
/// number, so entries from concurrently running branches stay totally ordered.
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct ExecutionLog {
    state: Arc<Mutex<LogState>>,
    events: Option<broadcast::Sender<ExecutionEvent>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also publish every appended entry as `ExecutionEvent::Log`.
    pub fn with_events(mut self, sender: broadcast::Sender<ExecutionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, node_id: &str, kind: LogKind, message: impl Into<String>) -> LogEntry {
        let entry = {
            let mut state = self.lock();
            let entry = LogEntry {
                seq: state.next_seq,
                node_id: node_id.to_string(),
                message: message.into(),
                kind,
                timestamp: Utc::now(),
            };
            state.next_seq += 1;
            state.entries.push(entry.clone());
            entry
        };
        if let Some(sender) = &self.events {
            let _ = sender.send(ExecutionEvent::Log {
                entry: entry.clone(),
            });
        }
        entry
    }

    pub fn info(&self, node_id: &str, message: impl Into<String>) -> LogEntry {
        self.append(node_id, LogKind::Info, message)
    }

    pub fn success(&self, node_id: &str, message: impl Into<String>) -> LogEntry {
        self.append(node_id, LogKind::Success, message)
    }

    pub fn error(&self, node_id: &str, message: impl Into<String>) -> LogEntry {
        self.append(node_id, LogKind::Error, message)
    }

    /// Snapshot of all entries in append order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().entries.clone()
    }

    pub fn entries_for(&self, node_id: &str) -> Vec<LogEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.node_id == node_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries. Sequence numbers keep increasing across clears.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}
