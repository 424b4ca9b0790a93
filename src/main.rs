//! Binary entry point for activity-graph.
//!
//! Runs the activity read operations from the command line against a Neo4j
//! store or an in-memory graph, and prints results as JSON.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use activity_graph::config::{ActivityGraphConfig, default_paths};
use activity_graph::observability::{
    self, InitOptions, ObservabilityHandle, RequestContext, enter_request_context,
};
use activity_graph::storage::{BulkheadGraphClient, InMemoryGraphClient, Neo4jHttpClient};
use activity_graph::{ActivityRequest, ActivityService, ErrorBody, GraphClient, ServiceOptions};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Activity-stream access over a graph database.
#[derive(Parser)]
#[command(name = "activity-graph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "ACTIVITY_GRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Render and log queries without executing them.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Graph store to query.
    #[arg(long, global = true, value_enum, default_value_t = StoreKind::Neo4j)]
    store: StoreKind,

    /// JSON fixture loaded into the in-memory store.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Correlation id for log events.
    #[arg(long, global = true)]
    request_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Graph store selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Neo4j HTTP endpoint from configuration.
    Neo4j,
    /// In-process graph.
    Memory,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a read operation, e.g. `get /user/1/FAVORITED`.
    Get {
        /// Request path: `/{type}[/{id}[/{verb}|activities[/{objectType}]]]`.
        path: String,
    },

    /// Print the rendered query and parameters for a path.
    Explain {
        /// Request path.
        path: String,
    },

    /// Run one request path per stdin line, printing one JSON result per line.
    ///
    /// Serves the Prometheus exporter on the configured metrics port while
    /// running.
    Batch,

    /// Check that the graph store is reachable.
    Status,

    /// Show the effective configuration.
    Config,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match ActivityGraphConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let expose_metrics = matches!(cli.command, Commands::Batch);
    let observability = match observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: expose_metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let context = cli
        .request_id
        .clone()
        .map_or_else(RequestContext::new, RequestContext::from_id);
    let _context = enter_request_context(context);

    match run_command(cli, config, &observability) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        },
    }
}

/// Prints a crate error as an `ErrorBody`, anything else as text.
fn report(err: &anyhow::Error) {
    if let Some(e) = err.downcast_ref::<activity_graph::Error>() {
        let body = ErrorBody::from(e);
        match serde_json::to_string(&body) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("Error: {e}"),
        }
    } else {
        eprintln!("Error: {err:#}");
    }
}

/// Runs the selected command.
fn run_command(
    cli: Cli,
    config: ActivityGraphConfig,
    observability: &ObservabilityHandle,
) -> anyhow::Result<()> {
    let config = if cli.dry_run {
        config.with_dry_run(true)
    } else {
        config
    };
    let options = ServiceOptions::from(config.service);

    match cli.command {
        Commands::Get { path } => {
            let service = build_service(cli.store, cli.fixture.as_deref(), &config, options)?;
            let request = ActivityRequest::from_path(&path)?;
            let response = service.handle(&request)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        },
        Commands::Explain { path } => cmd_explain(&path),
        Commands::Batch => {
            let service = build_service(cli.store, cli.fixture.as_deref(), &config, options)?;
            cmd_batch(&service, std::io::stdin().lock())
        },
        Commands::Status => cmd_status(
            cli.store,
            cli.fixture.as_deref(),
            &config,
            options,
            observability,
        ),
        Commands::Config => cmd_config(&config, cli.config.as_deref()),
    }
}

fn build_service(
    store: StoreKind,
    fixture: Option<&Path>,
    config: &ActivityGraphConfig,
    options: ServiceOptions,
) -> anyhow::Result<ActivityService<Box<dyn GraphClient>>> {
    let client: Box<dyn GraphClient> = match store {
        StoreKind::Neo4j => Box::new(BulkheadGraphClient::new(
            Neo4jHttpClient::new(&config.graph)?,
            config.graph.bulkhead(),
        )),
        StoreKind::Memory => {
            let memory = InMemoryGraphClient::new();
            if let Some(path) = fixture {
                load_fixture(&memory, path)?;
            }
            Box::new(memory)
        },
    };
    Ok(ActivityService::new(client, options))
}

fn cmd_explain(path: &str) -> anyhow::Result<()> {
    let request = ActivityRequest::from_path(path)?;
    let rendered = activity_graph::render(&request.build()?)?;
    println!("// operation: {}", request.operation());
    println!("{}", rendered.text);
    println!("// parameters: {}", rendered.parameters.to_json());
    Ok(())
}

/// Runs each non-empty input line as a request path.
///
/// Failures are reported per line and do not stop the batch.
fn cmd_batch(
    service: &ActivityService<Box<dyn GraphClient>>,
    input: impl BufRead,
) -> anyhow::Result<()> {
    let mut failed = 0usize;
    for line in input.lines() {
        let line = line.context("reading request paths from stdin")?;
        let path = line.trim();
        if path.is_empty() {
            continue;
        }
        let _context = enter_request_context(RequestContext::new());
        let result = ActivityRequest::from_path(path).and_then(|request| service.handle(&request));
        match result {
            Ok(response) => println!("{}", serde_json::to_string(&response)?),
            Err(e) => {
                failed += 1;
                tracing::warn!(path, error = %e, "Batch request failed");
                println!(
                    "{}",
                    serde_json::json!({ "path": path, "error": ErrorBody::from(&e) })
                );
            },
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} batch request(s) failed");
    }
    Ok(())
}

fn cmd_status(
    store: StoreKind,
    fixture: Option<&Path>,
    config: &ActivityGraphConfig,
    options: ServiceOptions,
    observability: &ObservabilityHandle,
) -> anyhow::Result<()> {
    println!("activity-graph {}", env!("CARGO_PKG_VERSION"));
    let service = build_service(store, fixture, config, options)?;
    println!("Store: {}", service.client().name());
    if store == StoreKind::Neo4j {
        println!("  URL: {}", config.graph.url);
        println!("  Database: {}", config.graph.database);
    }
    println!("Dry run: {}", options.dry_run);
    service.ping()?;
    println!("Status: reachable");
    if let Some(metrics) = observability.metrics() {
        println!("\n{}", metrics.render());
    }
    Ok(())
}

fn cmd_config(config: &ActivityGraphConfig, explicit: Option<&Path>) -> anyhow::Result<()> {
    match explicit {
        Some(path) => println!("# config file: {}", path.display()),
        None => {
            for path in default_paths() {
                let state = if path.exists() { "found" } else { "absent" };
                println!("# {state}: {}", path.display());
            }
        },
    }
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

/// In-memory fixture file.
#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    nodes: Vec<FixtureNode>,
    #[serde(default)]
    edges: Vec<FixtureEdge>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
struct FixtureNode {
    label: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct FixtureEdge {
    from: FixtureNode,
    verb: String,
    to: FixtureNode,
}

fn load_fixture(store: &InMemoryGraphClient, path: &Path) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    let fixture: Fixture = serde_json::from_str(&contents)
        .with_context(|| format!("parsing fixture {}", path.display()))?;

    let mut ids: Vec<(&FixtureNode, String)> = Vec::new();
    for node in &fixture.nodes {
        ids.push((node, store.add_node(&node.label, &node.id)?));
    }
    let lookup = |wanted: &FixtureNode| {
        ids.iter()
            .find(|(node, _)| *node == wanted)
            .map(|(_, id)| id.clone())
            .with_context(|| format!("edge references unknown node {}/{}", wanted.label, wanted.id))
    };
    for edge in &fixture.edges {
        store.add_edge(&lookup(&edge.from)?, &edge.verb, &lookup(&edge.to)?)?;
    }
    tracing::info!(
        nodes = store.node_count(),
        edges = store.edge_count(),
        "Loaded fixture"
    );
    Ok(())
}
