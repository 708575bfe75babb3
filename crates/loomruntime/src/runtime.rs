use crate::executor::{validate_graph, RunResult, WorkflowExecutor};
use crate::registry::NodeRegistry;
use loomcore::{EventBus, ExecutionLog, FlowError, Graph, Services, WorkflowError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the runtime's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Failed,
}

/// Main runtime for executing workflow graphs
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    executor: WorkflowExecutor,
    event_bus: Arc<EventBus>,
    log: ExecutionLog,
    services: Services,
    state: RwLock<EngineState>,
}

impl FlowRuntime {
    /// Create a runtime with an empty registry and default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(NodeRegistry::new()), config)
    }

    /// Create a runtime over a pre-populated registry
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let log = ExecutionLog::new().with_events(event_bus.sender());
        let executor = WorkflowExecutor::new(config);

        Self {
            registry,
            executor,
            event_bus,
            log,
            services: Services::default(),
            state: RwLock::new(EngineState::Idle),
        }
    }

    /// Replace the HTTP transport and credential collaborators.
    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.executor.config()
    }

    /// Run a graph to completion.
    pub async fn run(&self, graph: &Graph) -> Result<RunResult, FlowError> {
        self.run_with_cancellation(graph, CancellationToken::new()).await
    }

    /// Run a graph; once `cancellation` fires no further node invocations
    /// start, while ones already started finish.
    pub async fn run_with_cancellation(
        &self,
        graph: &Graph,
        cancellation: CancellationToken,
    ) -> Result<RunResult, FlowError> {
        *self.state.write().await = EngineState::Running;

        let result = self
            .executor
            .execute(
                graph,
                &self.registry,
                &self.log,
                &self.event_bus,
                &self.services,
                cancellation,
            )
            .await;

        let next = match &result {
            Ok(run) if run.is_success() => EngineState::Idle,
            _ => EngineState::Failed,
        };
        *self.state.write().await = next;
        result
    }

    /// Check a graph against the registry without running it.
    pub fn validate(&self, graph: &Graph) -> Result<(), WorkflowError> {
        validate_graph(graph, &self.registry)
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// The execution log of the latest run. Kept until the next run or
    /// [`clear_log`](Self::clear_log).
    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn clear_log(&self) {
        self.log.clear();
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<loomcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// How sibling branches are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchMode {
    /// Depth-first, edges in insertion order.
    #[default]
    Sequential,
    /// Siblings interleave on the run's task; parent-before-child order holds
    /// within each branch.
    Concurrent,
}

/// How a node with several incoming edges is fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanInMode {
    /// Invoke the node once per incoming edge with that edge's items.
    #[default]
    PerEdge,
    /// Invoke the node once with the items of all delivered edges.
    Merge,
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub branch_mode: BranchMode,
    pub fan_in: FanInMode,
    pub event_buffer_size: usize,
    /// Do not follow edges whose output item-set is empty.
    pub skip_empty_outputs: bool,
}

impl RuntimeConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            branch_mode: BranchMode::Sequential,
            fan_in: FanInMode::PerEdge,
            event_buffer_size: 1000,
            skip_empty_outputs: false,
        }
    }
}
