// crates/loomcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loomcore::{
    CredentialStore, ExecutionEvent, Graph, JsonObject, LogKind, NoCredentials, NodeInstance, Services,
    SimulatedTransport, StaticCredentials, Value,
};
use loomnodes::{standard_registry, ReqwestTransport};
use loomruntime::{BranchMode, FanInMode, FlowRuntime, RuntimeConfig};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Loom workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Runtime configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Credentials JSON file: `{"<credential type>": {fields}}`
        #[arg(long)]
        credentials: Option<PathBuf>,

        /// Send HTTP requests over the network instead of simulating them
        #[arg(long)]
        live: bool,

        /// Interleave sibling branches
        #[arg(long)]
        concurrent: bool,

        /// Invoke fan-in nodes once with the items of all incoming edges
        #[arg(long)]
        merge_fan_in: bool,

        /// Print output items of every node
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            config,
            credentials,
            live,
            concurrent,
            merge_fan_in,
            verbose,
        } => {
            init_tracing(verbose);

            let mut config = match config {
                Some(path) => RuntimeConfig::from_file(&path)
                    .with_context(|| format!("reading config {}", path.display()))?,
                None => RuntimeConfig::default(),
            };
            if concurrent {
                config.branch_mode = BranchMode::Concurrent;
            }
            if merge_fan_in {
                config.fan_in = FanInMode::Merge;
            }

            tracing::debug!(?config, live, "runtime configuration");
            let services = build_services(live, credentials.as_deref())?;
            run_workflow(&file, config, services, verbose).await?;
        }

        Commands::Validate { file } => {
            init_tracing(false);
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn load_graph(file: &Path) -> Result<Graph> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading workflow {}", file.display()))?;
    let graph: Graph = serde_json::from_str(&text)
        .with_context(|| format!("parsing workflow {}", file.display()))?;
    Ok(graph)
}

fn build_services(live: bool, credentials: Option<&Path>) -> Result<Services> {
    let store: Arc<dyn CredentialStore> = match credentials {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading credentials {}", path.display()))?;
            let entries: JsonObject = serde_json::from_str(&text)?;
            let store = entries
                .into_iter()
                .fold(StaticCredentials::new(), |store, (kind, fields)| match fields {
                    Value::Object(fields) => store.with(kind, fields),
                    _ => store,
                });
            Arc::new(store)
        }
        None => Arc::new(NoCredentials),
    };

    Ok(if live {
        Services::new(Arc::new(ReqwestTransport::new()), store)
    } else {
        Services::new(Arc::new(SimulatedTransport), store)
    })
}

async fn run_workflow(file: &Path, config: RuntimeConfig, services: Services, verbose: bool) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());
    let graph = load_graph(file)?;

    println!("📋 Workflow: {}", graph.name);
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Edges: {}", graph.edges.len());
    println!();

    let runtime = FlowRuntime::with_registry(Arc::new(standard_registry()), config).with_services(services);

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::RunStarted { graph, .. } => {
                    println!("▶️  Run of '{}' started", graph);
                }
                ExecutionEvent::Log { entry } => {
                    let marker = match entry.kind {
                        LogKind::Info => "ℹ️ ",
                        LogKind::Success => "✅",
                        LogKind::Error => "❌",
                    };
                    println!("  {} [{}] {}", marker, entry.node_id, entry.message);
                }
                ExecutionEvent::RunCompleted {
                    success, duration_ms, ..
                } => {
                    if success {
                        println!("✨ Run completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Run finished with failures after {}ms", duration_ms);
                    }
                }
                _ => {}
            }
        }
    });

    let result = runtime.run(&graph).await;

    // Dropping the runtime closes the event bus, which ends the listener.
    drop(runtime);
    let _ = event_task.await;
    let result = result?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.execution_id);
    println!("   Invocations: {}", result.node_runs.len());

    for run in &result.node_runs {
        match &run.error {
            Some(e) => println!("   {} (#{}) failed: {}", run.node_id, run.invocation, e),
            None => {
                let counts: Vec<String> = run.outputs.iter().map(|o| o.len().to_string()).collect();
                println!(
                    "   {} (#{}) items per output: [{}] in {}ms",
                    run.node_id,
                    run.invocation,
                    counts.join(", "),
                    run.duration_ms
                );
                if verbose {
                    println!("{}", serde_json::to_string_pretty(&run.outputs)?);
                }
            }
        }
    }

    if !result.is_success() {
        anyhow::bail!("nodes failed: {}", result.failed_nodes().join(", "));
    }
    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());
    let graph = load_graph(file)?;

    let runtime = FlowRuntime::with_registry(Arc::new(standard_registry()), RuntimeConfig::default());
    runtime.validate(&graph)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", graph.name);
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Edges: {}", graph.edges.len());
    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = standard_registry();
    for descriptor in registry.list() {
        println!("  • {} ({})", descriptor.name, descriptor.group);
        println!("    {}", descriptor.description);
        if descriptor.output_count > 1 {
            println!("    outputs: {}", descriptor.output_names.join(", "));
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut graph = Graph::new("Example HTTP Workflow");

    graph.add_node(
        NodeInstance::new("trigger", "manualTrigger")
            .with_label("Start")
            .with_param("payload", json!({"user": "octocat"}).to_string())
            .with_position(100.0, 100.0),
    );
    graph.add_node(
        NodeInstance::new("fetch", "httpRequest")
            .with_label("Fetch User")
            .with_param("url", "https://api.github.com/users/{{ $json.user }}")
            .with_position(300.0, 100.0),
    );
    graph.add_node(
        NodeInstance::new("ok", "if")
            .with_label("Status OK?")
            .with_param(
                "conditions",
                json!({"condition": [
                    {"leftValue": "={{ $json.statusCode }}", "operator": "equals", "rightValue": "200"}
                ]}),
            )
            .with_position(500.0, 100.0),
    );
    graph.add_node(
        NodeInstance::new("summary", "set")
            .with_label("Summarize")
            .with_param("keepOnlySet", true)
            .with_param(
                "values",
                json!({"string": [{"name": "login", "value": "{{ $json.body.login }}"}]}),
            )
            .with_position(700.0, 50.0),
    );

    graph.connect("trigger", "fetch");
    graph.connect("fetch", "ok");
    graph.connect_handle("ok", "true", "summary");

    let json = serde_json::to_string_pretty(&graph)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  loom run --file {} --live", output.display());

    Ok(())
}
