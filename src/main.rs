//! pdfshell - entry point
//!
//! `serve` runs the MCP server for one session over stdio; `run` invokes a
//! tool directly with names relative to the files root.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfshell::config::parse_list;
use pdfshell::{run_server, Config, Engine};
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// pdfshell - merge, split, stamp and redact PDFs inside sandboxed roots
#[derive(Parser, Debug)]
#[command(name = "pdfshell")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Shared files directory, also the root for `run`
    #[arg(long)]
    files_root: Option<PathBuf>,

    /// Parent directory of per-session upload directories
    #[arg(long)]
    uploads_root: Option<PathBuf>,

    /// Comma separated filenames under the files root visible to every session
    #[arg(long)]
    shared: Option<String>,

    /// Append audit records to this JSON-lines file
    #[arg(long)]
    audit_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP over stdio for one session
    Serve {
        /// Session id (default: random)
        #[arg(long)]
        session: Option<String>,
    },

    /// Run a tool once, resolving names relative to the files root
    Run {
        /// Tool name: merge, split, add_stamp or redact
        tool: String,

        /// Arguments as a JSON object, e.g. '{"files": ["a.pdf", "b.pdf"]}'
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Remove session directories older than the retention period
    Cleanup {
        /// Retention in days (default: configured retention)
        #[arg(long)]
        days: Option<u64>,

        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Show recent audit records
    History {
        /// Number of records to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(root) = &self.files_root {
            config.files_root = root.clone();
        }
        if let Some(root) = &self.uploads_root {
            config.uploads_root = root.clone();
        }
        if let Some(shared) = &self.shared {
            config.shared_files = parse_list(shared);
        }
        if let Some(path) = &self.audit_log {
            config.audit_log = Some(path.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdfshell=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    tracing::debug!(?config, "loaded configuration");
    let engine = Arc::new(Engine::from_config(config));

    match cli.command {
        Commands::Serve { session } => {
            tracing::info!("Starting pdfshell MCP server");
            run_server(engine, session).await
        }
        Commands::Run { tool, args } => run_once(engine, tool, &args).await,
        Commands::Cleanup { days, dry_run } => {
            let days = days.unwrap_or(engine.config().retention_days);
            let retention = Duration::from_secs(days.saturating_mul(24 * 60 * 60));
            let report = engine.sessions().sweep_expired(retention, dry_run)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::History { limit } => {
            for record in engine.audit().recent(limit)? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
    }
}

async fn run_once(engine: Arc<Engine>, tool: String, raw_args: &str) -> Result<()> {
    let args: Map<String, Value> = match serde_json::from_str::<Value>(raw_args)
        .with_context(|| "--args must be a JSON object")?
    {
        Value::Object(map) => map,
        other => bail!("--args must be a JSON object, got {}", other),
    };

    let output = tokio::task::spawn_blocking(move || engine.run_tool(&tool, &args, None))
        .await
        .context("tool task panicked")??;
    println!("{}", output);
    Ok(())
}
