//! dbgraph: code-to-database dependency graph builder
//!
//! Scans a source tree of T-SQL schema scripts and C# code (inline SQL, ORM
//! mappings, migrations) and writes the merged dependency graph to SQLite.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use dbgraph::workspace::CONFIG_FILE_NAME;
use dbgraph::{GraphConfig, GraphPipeline, GraphStats, Workspace};

#[derive(Parser)]
#[command(name = "dbgraph")]
#[command(about = "Build a code-to-database dependency graph", long_about = None)]
#[command(version)]
struct Cli {
    /// Root directory to scan
    root: PathBuf,

    /// Config file (defaults to dbgraph.toml in the root)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite output database path
    #[arg(short, long, default_value = "dbgraph.db")]
    output: PathBuf,

    /// Number of parallel threads (defaults to CPU count)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Directory for daily-rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Override the ORM model root (relative to the scanned root)
    #[arg(long)]
    model_root: Option<String>,

    /// Extra hot-method name token (repeatable)
    #[arg(long = "hot-method")]
    hot_methods: Vec<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.as_ref())?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(CONFIG_FILE_NAME));
    let mut config = GraphConfig::load_or_default(&config_path);
    if let Some(model_root) = cli.model_root {
        config.model_root = model_root;
    }
    config.hot_methods.extend(cli.hot_methods);
    debug!("Effective configuration: {:?}", config);

    info!("Scanning {}", cli.root.display());
    let pipeline = GraphPipeline::new(Workspace::new(&cli.root, config))
        .with_threads(cli.threads.unwrap_or(0));
    let stats = pipeline
        .run_to_database(&cli.output)
        .with_context(|| format!("Failed to build graph for {}", cli.root.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_summary(&stats, &cli.output);
    }
    Ok(())
}

/// Stderr plus, with `--log-dir`, a daily-rolling file. The guard flushes the file on drop.
fn init_logging(log_dir: Option<&PathBuf>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("dbgraph=info"))
        .context("Invalid log filter")?;

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let (non_blocking_file, guard) = non_blocking(rolling::daily(dir, "dbgraph.log"));
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking_file)
                        .with_target(true)
                        .with_ansi(false)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            Ok(None)
        }
    }
}

fn print_summary(stats: &GraphStats, output: &std::path::Path) {
    println!("Graph written to {}", output.display());
    println!(
        "  files: {} scanned, {} skipped",
        stats.files_scanned, stats.files_skipped
    );
    println!(
        "  nodes: {} ({} stubs)",
        stats.node_total(),
        stats.stub_nodes
    );
    for (kind, count) in &stats.nodes_by_kind {
        println!("    {:<10} {}", kind, count);
    }
    println!("  edges:");
    for (relation, count) in &stats.edges_by_relation {
        println!("    {:<12} {}", relation, count);
    }
    if stats.statements > 0 {
        println!("  unreferenced statements: {}", stats.statements);
    }
}
