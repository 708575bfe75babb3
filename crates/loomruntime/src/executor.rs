use crate::registry::NodeRegistry;
use crate::runtime::{BranchMode, FanInMode, RuntimeConfig};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use loomcore::{
    EventBus, EventEmitter, ExecutionEvent, ExecutionId, ExecutionLog, FlowError, Graph, Item,
    LogEntry, NodeBehavior, NodeContext, NodeDescriptor, NodeError, NodeInstance, NodeOutput,
    NodeParameters, Services, WorkflowError,
};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A graph node joined with its registered type and compiled configuration.
struct PreparedNode<'g> {
    instance: &'g NodeInstance,
    descriptor: Arc<NodeDescriptor>,
    behavior: Arc<dyn NodeBehavior>,
    parameters: Arc<NodeParameters>,
}

/// Shared state of one run.
struct RunContext<'g> {
    execution_id: ExecutionId,
    graph: &'g Graph,
    nodes: HashMap<&'g str, PreparedNode<'g>>,
    log: &'g ExecutionLog,
    event_bus: &'g EventBus,
    services: &'g Services,
    cancellation: CancellationToken,
    runs: Mutex<Vec<NodeRun>>,
    invocations: Mutex<HashMap<String, usize>>,
    failures: AtomicUsize,
}

impl RunContext<'_> {
    fn next_invocation(&self, node_id: &str) -> usize {
        let mut invocations = self.invocations.lock().unwrap_or_else(PoisonError::into_inner);
        let count = invocations.entry(node_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn record(&self, run: NodeRun) {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).push(run);
    }
}

/// Walks a graph from its triggers, invoking node behaviors and routing their
/// output item-sets along edges.
pub struct WorkflowExecutor {
    config: RuntimeConfig,
}

impl WorkflowExecutor {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Execute a graph and return the per-node results.
    ///
    /// Fails outright only for graph-level problems, leaving the log empty.
    /// Node failures are logged and stop their own branch.
    pub async fn execute(
        &self,
        graph: &Graph,
        registry: &NodeRegistry,
        log: &ExecutionLog,
        event_bus: &EventBus,
        services: &Services,
        cancellation: CancellationToken,
    ) -> Result<RunResult, FlowError> {
        log.clear();

        let nodes = prepare(graph, registry)?;
        validate_edges(graph, &nodes)?;
        if is_cyclic_directed(&build_graph(graph)) {
            return Err(WorkflowError::CyclicDependency.into());
        }

        let roots: Vec<&str> = graph
            .nodes
            .iter()
            .filter(|n| nodes[n.id.as_str()].descriptor.is_trigger())
            .map(|n| n.id.as_str())
            .collect();
        if roots.is_empty() {
            return Err(WorkflowError::NoTrigger.into());
        }

        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();

        event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            graph: graph.name.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            %execution_id,
            roots = roots.len(),
            nodes = graph.nodes.len(),
            "Starting workflow execution: {}",
            graph.name
        );

        let run = RunContext {
            execution_id,
            graph,
            nodes,
            log,
            event_bus,
            services,
            cancellation,
            runs: Mutex::new(Vec::new()),
            invocations: Mutex::new(HashMap::new()),
            failures: AtomicUsize::new(0),
        };

        match self.config.fan_in {
            FanInMode::PerEdge => {
                let branches = roots
                    .iter()
                    .copied()
                    .map(|root| self.visit(&run, root, vec![Item::seed()]));
                self.drive(branches.collect()).await;
            }
            FanInMode::Merge => self.execute_merged(&run, &roots).await,
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let failures = run.failures.load(Ordering::SeqCst);
        let status = if failures == 0 {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };

        event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id,
            success: status == RunStatus::Succeeded,
            duration_ms,
            timestamp: Utc::now(),
        });
        tracing::info!(%execution_id, failures, duration_ms, "Workflow execution finished");

        Ok(RunResult {
            execution_id,
            status,
            node_runs: run.runs.into_inner().unwrap_or_else(PoisonError::into_inner),
            log: log.entries(),
            duration_ms,
        })
    }

    /// Await sibling branches, in order or interleaved depending on the mode.
    async fn drive(&self, branches: Vec<BoxFuture<'_, ()>>) {
        match self.config.branch_mode {
            BranchMode::Sequential => {
                for branch in branches {
                    branch.await;
                }
            }
            BranchMode::Concurrent => {
                let mut running: FuturesUnordered<_> = branches.into_iter().collect();
                while running.next().await.is_some() {}
            }
        }
    }

    /// Execute `node_id` with `items`, then recurse along each outgoing edge
    /// with the item-set of the output the edge is attached to.
    fn visit<'a>(
        &'a self,
        run: &'a RunContext<'a>,
        node_id: &'a str,
        items: Vec<Item>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(output) = self.invoke(run, node_id, items).await else {
                return;
            };
            let node = &run.nodes[node_id];

            let mut children = Vec::new();
            for edge in run.graph.outgoing(node_id) {
                let Some(index) = node.descriptor.output_index(edge.source_handle.as_deref()) else {
                    continue;
                };
                let items = output.output(index).to_vec();
                if items.is_empty() && self.config.skip_empty_outputs {
                    tracing::debug!(edge = %edge.id, "skipping edge with no items");
                    continue;
                }
                children.push(self.visit(run, &edge.target, items));
            }
            self.drive(children).await;
        })
    }

    /// Run one node invocation end to end: validation, logging, the behavior
    /// call and bookkeeping. Returns `None` when the branch must stop.
    async fn invoke(&self, run: &RunContext<'_>, node_id: &str, items: Vec<Item>) -> Option<NodeOutput> {
        if run.cancellation.is_cancelled() {
            tracing::info!(node = %node_id, "run cancelled, not starting node");
            return None;
        }

        let node = &run.nodes[node_id];
        let name = node.instance.display_name();
        let invocation = run.next_invocation(node_id);

        run.log.info(node_id, format!("Executing {}", name));
        run.event_bus.emit(ExecutionEvent::NodeStarted {
            execution_id: run.execution_id,
            node_id: node_id.to_string(),
            node_type: node.instance.node_type.clone(),
            timestamp: Utc::now(),
        });
        tracing::debug!(
            node = %node_id,
            node_type = %node.instance.node_type,
            items = items.len(),
            invocation,
            "Executing node"
        );

        let start = Instant::now();
        let result = match node.parameters.validate_required() {
            Err(e) => Err(e),
            Ok(()) => {
                let ctx = NodeContext::new(node_id, node.parameters.clone(), items.clone())
                    .with_events(EventEmitter::new(node_id, run.log.clone()))
                    .with_services(run.services.clone())
                    .with_cancellation(run.cancellation.clone());
                call_behavior(node.behavior.as_ref(), ctx)
                    .await
                    .and_then(|output| check_outputs(&node.descriptor, output))
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                run.log.success(
                    node_id,
                    format!("{} completed: {}", name, describe_counts(&node.descriptor, &output)),
                );
                run.event_bus.emit(ExecutionEvent::NodeCompleted {
                    execution_id: run.execution_id,
                    node_id: node_id.to_string(),
                    item_counts: output.item_counts(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                tracing::info!("Node {} completed in {}ms", node_id, duration_ms);
                run.record(NodeRun {
                    node_id: node_id.to_string(),
                    invocation,
                    input: items,
                    outputs: output.outputs.clone(),
                    error: None,
                    duration_ms,
                });
                Some(output)
            }
            Err(e) => {
                run.log.error(node_id, format!("{} failed: {}", name, e));
                run.event_bus.emit(ExecutionEvent::NodeFailed {
                    execution_id: run.execution_id,
                    node_id: node_id.to_string(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                tracing::error!("Node {} failed: {}", node_id, e);
                run.failures.fetch_add(1, Ordering::SeqCst);
                run.record(NodeRun {
                    node_id: node_id.to_string(),
                    invocation,
                    input: items,
                    outputs: Vec::new(),
                    error: Some(e),
                    duration_ms,
                });
                None
            }
        }
    }

    /// Fan-in merge mode: every reached node runs once, in topological
    /// order, over the concatenated items of all its delivered incoming edges.
    async fn execute_merged(&self, run: &RunContext<'_>, roots: &[&str]) {
        let graph = run.graph;
        let order = match toposort(&build_graph(graph), None) {
            Ok(order) => order,
            Err(_) => return,
        };
        let roots: HashSet<&str> = roots.iter().copied().collect();
        let mut delivered: HashMap<usize, Vec<Item>> = HashMap::new();

        for index in order {
            let node_id = graph.nodes[index.index()].id.as_str();

            let input = if roots.contains(node_id) {
                Some(vec![Item::seed()])
            } else {
                let mut reached = false;
                let mut items = Vec::new();
                for (edge_index, _) in graph.edges.iter().enumerate().filter(|(_, e)| e.target == node_id) {
                    if let Some(edge_items) = delivered.remove(&edge_index) {
                        reached = true;
                        items.extend(edge_items);
                    }
                }
                reached.then_some(items)
            };
            let Some(input) = input else {
                continue;
            };

            let Some(output) = self.invoke(run, node_id, input).await else {
                continue;
            };
            let descriptor = &run.nodes[node_id].descriptor;
            for (edge_index, edge) in graph.edges.iter().enumerate().filter(|(_, e)| e.source == node_id) {
                let Some(output_index) = descriptor.output_index(edge.source_handle.as_deref()) else {
                    continue;
                };
                let items = output.output(output_index).to_vec();
                if items.is_empty() && self.config.skip_empty_outputs {
                    continue;
                }
                delivered.insert(edge_index, items);
            }
        }
    }
}

async fn call_behavior(behavior: &dyn NodeBehavior, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
    match AssertUnwindSafe(behavior.execute(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(NodeError::ExecutionFailed(format!("behavior panicked: {}", message)))
        }
    }
}

fn check_outputs(descriptor: &NodeDescriptor, output: NodeOutput) -> Result<NodeOutput, NodeError> {
    if output.outputs.len() != descriptor.output_count {
        return Err(NodeError::OutputMismatch {
            expected: descriptor.output_count,
            actual: output.outputs.len(),
        });
    }
    Ok(output)
}

fn describe_counts(descriptor: &NodeDescriptor, output: &NodeOutput) -> String {
    if descriptor.output_count == 1 {
        return format!("{} item(s)", output.output(0).len());
    }
    descriptor
        .output_names
        .iter()
        .zip(&output.outputs)
        .map(|(name, items)| format!("{}={}", name, items.len()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve every node's type and compile its configuration. Unknown types
/// are reported in node order.
fn prepare<'g>(
    graph: &'g Graph,
    registry: &NodeRegistry,
) -> Result<HashMap<&'g str, PreparedNode<'g>>, WorkflowError> {
    let mut nodes = HashMap::with_capacity(graph.nodes.len());
    for instance in &graph.nodes {
        let registered = registry.lookup(&instance.node_type)?;
        let parameters = NodeParameters::compile(registered.descriptor.clone(), &instance.data);
        let previous = nodes.insert(
            instance.id.as_str(),
            PreparedNode {
                instance,
                descriptor: registered.descriptor.clone(),
                behavior: registered.behavior.clone(),
                parameters: Arc::new(parameters),
            },
        );
        if previous.is_some() {
            return Err(WorkflowError::Invalid(format!("duplicate node id '{}'", instance.id)));
        }
    }
    Ok(nodes)
}

fn validate_edges(graph: &Graph, nodes: &HashMap<&str, PreparedNode<'_>>) -> Result<(), WorkflowError> {
    for edge in &graph.edges {
        let source = nodes
            .get(edge.source.as_str())
            .ok_or_else(|| WorkflowError::NodeNotFound(edge.source.clone()))?;
        if !nodes.contains_key(edge.target.as_str()) {
            return Err(WorkflowError::NodeNotFound(edge.target.clone()));
        }
        if source.descriptor.output_index(edge.source_handle.as_deref()).is_none() {
            return Err(WorkflowError::InvalidConnection(format!(
                "edge '{}' uses handle '{}' which '{}' ({}) does not declare",
                edge.id,
                edge.source_handle.as_deref().unwrap_or_default(),
                edge.source,
                source.descriptor.name,
            )));
        }
    }
    Ok(())
}

/// Dependency graph over node positions in `graph.nodes`. Edges with unknown
/// endpoints are left out.
fn build_graph(graph: &Graph) -> DiGraph<usize, usize> {
    let mut dag = DiGraph::new();
    let mut node_to_index: HashMap<&str, NodeIndex> = HashMap::new();

    for (position, node) in graph.nodes.iter().enumerate() {
        let idx = dag.add_node(position);
        node_to_index.insert(node.id.as_str(), idx);
    }
    for (position, edge) in graph.edges.iter().enumerate() {
        if let (Some(from), Some(to)) = (
            node_to_index.get(edge.source.as_str()),
            node_to_index.get(edge.target.as_str()),
        ) {
            dag.add_edge(*from, *to, position);
        }
    }
    dag
}

/// Check a graph against a registry without running it.
pub fn validate_graph(graph: &Graph, registry: &NodeRegistry) -> Result<(), WorkflowError> {
    let nodes = prepare(graph, registry)?;
    validate_edges(graph, &nodes)?;
    if is_cyclic_directed(&build_graph(graph)) {
        return Err(WorkflowError::CyclicDependency);
    }
    if !nodes.values().any(|n| n.descriptor.is_trigger()) {
        return Err(WorkflowError::NoTrigger);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every invoked node succeeded.
    Succeeded,
    /// At least one node failed; sibling branches still ran.
    Failed,
}

/// One invocation of one node.
#[derive(Debug, Clone)]
pub struct NodeRun {
    pub node_id: String,
    /// 1-based count of invocations of this node within the run.
    pub invocation: usize,
    pub input: Vec<Item>,
    pub outputs: Vec<Vec<Item>>,
    pub error: Option<NodeError>,
    pub duration_ms: u64,
}

impl NodeRun {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a run, handed back to the caller.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub execution_id: ExecutionId,
    pub status: RunStatus,
    /// Invocations in completion order.
    pub node_runs: Vec<NodeRun>,
    pub log: Vec<LogEntry>,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn runs_for(&self, node_id: &str) -> Vec<&NodeRun> {
        self.node_runs.iter().filter(|r| r.node_id == node_id).collect()
    }

    /// Node ids in the order their invocations completed.
    pub fn executed_nodes(&self) -> Vec<&str> {
        self.node_runs.iter().map(|r| r.node_id.as_str()).collect()
    }

    /// Items on `output` of the last successful invocation of `node_id`.
    pub fn output(&self, node_id: &str, output: usize) -> Vec<Item> {
        self.node_runs
            .iter()
            .rev()
            .find(|r| r.node_id == node_id && r.succeeded())
            .and_then(|r| r.outputs.get(output).cloned())
            .unwrap_or_default()
    }

    pub fn failed_nodes(&self) -> Vec<&str> {
        self.node_runs
            .iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.node_id.as_str())
            .collect()
    }
}
