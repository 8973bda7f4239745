use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use arcfill::broker::sink::channel_sink;
use arcfill::config::{ConfigError, ServiceConfig};
use arcfill::resolver::focus;
use arcfill::runtime::loopback::LoopbackRuntime;
use arcfill::view::{FillRequest, LoadError};
use arcfill::AutofillService;

#[derive(Parser)]
#[command(name = "arcfilld", about = "Autofill bridge for Arcs-style runtimes")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the focused field id in a fill request, or `none`.
    Resolve {
        /// Fill request JSON file.
        request: PathBuf,
    },
    /// Run a fill request against the in-process loopback runtime and
    /// print the outcome as JSON.
    Fill {
        /// Fill request JSON file.
        request: PathBuf,
        /// Service config JSON file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Suggestion value offered by the loopback runtime (repeatable).
        #[arg(long = "suggest")]
        suggestions: Vec<String>,
        /// Delay before the loopback runtime publishes its output.
        #[arg(long, default_value_t = 0)]
        render_delay_ms: u64,
        /// Cancel the request after this many milliseconds.
        #[arg(long)]
        cancel_after_ms: Option<u64>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("fill completed without an outcome")]
    NoOutcome,
    #[error("encoding outcome: {0}")]
    Encode(#[from] serde_json::Error),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "arcfill=debug" } else { "arcfill=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_fill(
    request: PathBuf,
    config: Option<PathBuf>,
    suggestions: Vec<String>,
    render_delay_ms: u64,
    cancel_after_ms: Option<u64>,
) -> Result<(), CliError> {
    let request = FillRequest::from_path(&request)?;
    let config = match config {
        Some(path) => ServiceConfig::from_path(&path)?,
        None => ServiceConfig::default(),
    };

    let (runtime, transport) = LoopbackRuntime::new(suggestions, Duration::from_millis(render_delay_ms));
    let service = AutofillService::new(&config, Arc::new(runtime))?;
    tokio::spawn(service.device_client().pump(transport));

    let cancel = CancellationToken::new();
    if let Some(ms) = cancel_after_ms {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            tracing::info!(after_ms = ms, "cancelling fill request");
            cancel.cancel();
        });
    }

    let (sink, outcome) = channel_sink();
    service.on_fill_request(&request, cancel, sink);
    let outcome = outcome.await.map_err(|_| CliError::NoOutcome)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Resolve { request } => FillRequest::from_path(&request)
            .map(|req| {
                match focus::resolve_latest(&req.fill_contexts) {
                    Some(node) => println!("{}", node.id),
                    None => println!("none"),
                }
            })
            .map_err(CliError::from),
        Command::Fill {
            request,
            config,
            suggestions,
            render_delay_ms,
            cancel_after_ms,
        } => run_fill(request, config, suggestions, render_delay_ms, cancel_after_ms).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "arcfilld failed");
            ExitCode::FAILURE
        }
    }
}
