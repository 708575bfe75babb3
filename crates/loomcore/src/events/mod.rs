mod base;
mod log;

pub use base::{EventBus, EventEmitter, ExecutionEvent, ExecutionId};
pub use log::{ExecutionLog, LogEntry, LogKind};
