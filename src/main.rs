use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fgswarm_core::config::{AppConfig, API_KEY_ENV};
use fgswarm_core::event::EventBus;
use fgswarm_core::types::SwarmEvent;
use fgswarm_swarm::{ContextField, FocusGroupPipeline, RunLogger};

#[derive(Parser)]
#[command(
    name = "fgswarm",
    version,
    about = "Analyze focus group transcripts with a four-agent swarm"
)]
struct Cli {
    /// Path to config file (optional; defaults apply if absent)
    #[arg(short, long, default_value = "fgswarm.toml")]
    config: PathBuf,

    /// Directory holding transcripts.md and objectives.md
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory the report is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline (default)
    Run,
    /// Print the effective configuration as TOML
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fgswarm=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "fgswarm", &mut io::stdout());
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.paths.data_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.paths.output_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Config => print_config(&config),
        Commands::Run => run_pipeline(config).await,
        Commands::Completions { .. } => Ok(()),
    }
}

fn print_config(config: &AppConfig) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.model.api_key.is_some() {
        shown.model.api_key = Some("<redacted>".into());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

async fn run_pipeline(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    if config.model.api_key.is_none() {
        warn!("No API key configured. Set {} or model.api_key", API_KEY_ENV);
    }

    let llm = fgswarm_llm::create_client(&config.model)?;
    let event_bus = Arc::new(EventBus::default());

    // Subscribe before the run starts so no event is missed
    let logger_handle = match config.log.as_ref().filter(|l| l.enabled) {
        Some(log) => {
            let logger = RunLogger::new(log.log_dir.clone());
            let rx = event_bus.subscribe();
            Some(tokio::spawn(logger.run(rx, CancellationToken::new())))
        }
        None => None,
    };
    let print_handle = spawn_event_printer(&event_bus);

    let pipeline = FocusGroupPipeline::new(config, llm, event_bus)?;

    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let result = pipeline.run().await;
    // Dropping the pipeline closes the event bus for the printer.
    drop(pipeline);
    print_handle.await.ok();

    if let Some(handle) = logger_handle {
        if let Ok(Some(path)) = handle.await {
            info!(path = %path.display(), "Run trace written");
        }
    }

    let outcome = result?;

    eprintln!();
    eprintln!(
        "Run {} complete: {} turns, {} input / {} output tokens, {:.1}s",
        outcome.run_id,
        outcome.total_turns,
        outcome.input_tokens,
        outcome.output_tokens,
        outcome.elapsed_ms as f64 / 1000.0
    );
    eprintln!("Route: {}", outcome.route().join(" -> "));
    if outcome.written_files.is_empty() {
        warn!(
            report_recorded = outcome.context.is_set(ContextField::Report.key()),
            "Run finished without writing a report file"
        );
    }
    for path in &outcome.written_files {
        println!("{}", path.display());
    }
    Ok(())
}

fn spawn_event_printer(event_bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            };
            match event {
                SwarmEvent::AgentActivated { agent } => eprintln!("\n== {} ==", agent),
                SwarmEvent::TextDelta(text) => {
                    eprint!("{}", text);
                    io::stderr().flush().ok();
                }
                SwarmEvent::OperationStart { op, .. } => eprintln!("\n[op: {}]", op),
                SwarmEvent::OperationEnd {
                    op,
                    status,
                    is_error,
                    ..
                } => {
                    let tag = if is_error { "ERROR" } else { "ok" };
                    eprintln!("[{}: {}] {}", op, tag, truncate(&status, 200));
                }
                SwarmEvent::Handoff { from, to } => eprintln!("\n[handoff: {} -> {}]", from, to),
                SwarmEvent::RunError { error, .. } => {
                    eprintln!("\n[error: {}]", error);
                    break;
                }
                SwarmEvent::RunComplete { .. } => break,
                SwarmEvent::RunStarted { .. } | SwarmEvent::AgentComplete { .. } => {}
            }
        }
    })
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
