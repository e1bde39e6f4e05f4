// ScanHub - Main Entry Point
//
// Serves the tool execution and reporting pipeline over HTTP, and offers
// one-shot CLI invocations of the same pipeline for local debugging.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scanhub::config::Config;
use scanhub::persist::MemoryStore;
use scanhub::pipeline::Pipeline;
use scanhub::registry::ToolRegistry;
use scanhub::request::{Identity, ToolRequest};
use scanhub::server::{self, AppState};
use scanhub::supervisor::{CommandValidator, ExecutionSupervisor};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// ScanHub: uniform execution and reporting for security analysis tools
#[derive(Parser, Debug)]
#[command(name = "scanhub")]
#[command(author = "ScanHub Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Tool execution and reporting pipeline", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a config file (default: XDG config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// List the registered tool ids
    ListTools,
    /// Run a single tool through the pipeline and print the report
    Run {
        /// Tool id to invoke
        tool: String,

        /// Text input for the tool
        #[arg(long, default_value = "")]
        input: String,

        /// Operation mode, for tools that take one
        #[arg(long, default_value = "")]
        mode: String,

        /// Identity token; when set, the report is persisted
        #[arg(long)]
        identity: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    init_tracing(&args, &config);

    let state = build_state(config)?;

    match args.command {
        None | Some(Commands::Serve) => {
            info!("ScanHub v0.1.0 starting...");
            server::serve(state).await?;
        }
        Some(Commands::ListTools) => {
            for tool_id in state.pipeline.registry().tool_ids() {
                println!("{tool_id}");
            }
        }
        Some(Commands::Run {
            tool,
            input,
            mode,
            identity,
        }) => {
            let request = ToolRequest::from_text(tool, input, mode, identity.map(Identity::new));
            match state.pipeline.run(request).await {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    if !report.ok {
                        std::process::exit(1);
                    }
                }
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(args: &Args, config: &Config) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(filter);

    match config.logging.format.as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
}

fn build_state(config: Config) -> Result<AppState> {
    let registry = ToolRegistry::builtin(
        &config.execution.backend_root,
        &config.execution.interpreter,
        Duration::from_secs(config.execution.timeout_secs),
    );
    info!("Registered {} tools", registry.len());

    let validator = if CommandValidator::default().is_allowed(&config.execution.interpreter) {
        CommandValidator::default()
    } else {
        CommandValidator::with_whitelist(vec![config.execution.interpreter.clone()])
    };

    let supervisor = ExecutionSupervisor::with_validator(validator)
        .with_max_output_bytes(config.execution.max_output_bytes);

    let pipeline = Pipeline::new(registry, supervisor, Arc::new(MemoryStore::new()));

    std::fs::create_dir_all(&config.uploads.dir)
        .with_context(|| format!("Failed to create upload directory {:?}", config.uploads.dir))?;

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        config: Arc::new(config),
    })
}
