mod orchestrator;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use noema_store::{NoemaConfig, resolve_base_dir};
use rmcp::{ServiceExt, transport::stdio};

use crate::orchestrator::{Orchestrator, Percept, SessionContext};

#[derive(Parser)]
#[command(name = "noema", about = "Noise-to-affect engine CLI and MCP server")]
struct Cli {
    /// Data directory (default: $NOEMA_DATA_DIR, then ~/.noema)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Run one percept through the pipeline and print the summary
    Process {
        /// Percept content
        content: String,

        #[arg(long, default_value = "default")]
        session: String,

        #[arg(long, default_value = "user")]
        source: String,

        /// Percept type
        #[arg(long, default_value = "text")]
        kind: String,

        /// Context tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Goal used to rank solutions
        #[arg(long)]
        goal: Option<String>,

        /// Print every state, thought, solution and the full trace
        #[arg(long)]
        full: bool,
    },

    /// Run the background flow for a number of cycles, then stop it
    Flow {
        #[arg(long, default_value = "default")]
        session: String,

        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
        cycles: u64,

        /// Override the configured delay between cycles
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Generate one noise chunk and print its hash and entropy
    Sample {
        /// Size in bytes
        #[arg(long)]
        size: Option<usize>,

        /// Use the deterministic seed
        #[arg(long)]
        seeded: bool,
    },

    /// Estimate entropy source quality
    Quality,

    /// Check text against the safety policy
    Validate {
        text: String,
    },

    /// Show persisted memory statistics
    Inspect {
        /// Session to inspect (default: all)
        #[arg(long)]
        session: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_config(cli: &Cli, base_dir: &Path) -> Result<NoemaConfig> {
    match &cli.config {
        Some(path) => {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
            NoemaConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
        }
        None => NoemaConfig::load_from_dir(base_dir).context("failed to load config"),
    }
}

fn open_orchestrator(cli: &Cli, tweak: impl FnOnce(&mut NoemaConfig)) -> Result<Orchestrator> {
    let base_dir = resolve_base_dir(cli.data_dir.as_deref());
    let mut config = load_config(cli, &base_dir)?;
    tweak(&mut config);
    tracing::debug!("data dir {}", base_dir.display());
    Orchestrator::open(config, &base_dir)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("failed to serialize output")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Process {
            content,
            session,
            source,
            kind,
            tags,
            goal,
            full,
        } => {
            let mut percept = Percept::new(source.as_str(), kind.as_str(), content.as_str());
            if let Some(goal) = goal {
                percept = percept.with_meta("goal", goal.as_str());
            }
            let context = SessionContext::new(session.as_str()).with_tags(tags.clone());
            cmd_process(&cli, &percept, &context, *full).await
        }
        Commands::Flow {
            session,
            cycles,
            interval_ms,
        } => cmd_flow(&cli, session, *cycles, *interval_ms).await,
        Commands::Sample { size, seeded } => cmd_sample(&cli, *size, *seeded),
        Commands::Quality => cmd_quality(&cli),
        Commands::Validate { text } => cmd_validate(&cli, text),
        Commands::Inspect { session } => cmd_inspect(&cli, session.as_deref()),
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let orchestrator = Arc::new(open_orchestrator(cli, |_| {})?);
    tracing::info!(
        "starting MCP server with state file {}",
        orchestrator.repository().path().display()
    );

    let server = server::NoemaServer::new(Arc::clone(&orchestrator));
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;

    orchestrator.shutdown().await;
    Ok(())
}

async fn cmd_process(cli: &Cli, percept: &Percept, context: &SessionContext, full: bool) -> Result<()> {
    let orchestrator = open_orchestrator(cli, |_| {})?;
    let outcome = orchestrator
        .process_percept(percept, context)
        .await
        .context("failed to process percept")?;
    if full {
        print_json(&outcome)
    } else {
        print_json(&outcome.summary())
    }
}

async fn cmd_flow(cli: &Cli, session: &str, cycles: u64, interval_ms: Option<u64>) -> Result<()> {
    let orchestrator = Arc::new(open_orchestrator(cli, |config| {
        if let Some(ms) = interval_ms {
            config.flow.interval_ms = ms;
        }
    })?);

    orchestrator.start_flow(SessionContext::new(session)).await?;
    let poll = Duration::from_millis(orchestrator.config().flow.interval_ms.clamp(1, 50));
    loop {
        let done = orchestrator.flow_cycles(session).await.unwrap_or(0);
        if done >= cycles {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted after {done} cycles");
                break;
            }
            _ = tokio::time::sleep(poll) => {}
        }
    }
    orchestrator.stop_flow(session).await;

    let ipoint = orchestrator
        .ipoint_snapshot(session)
        .await
        .context("flow finished without producing a session")?;
    print_json(&ipoint)
}

fn cmd_sample(cli: &Cli, size: Option<usize>, seeded: bool) -> Result<()> {
    anyhow::ensure!(size != Some(0), "size must be positive");
    let orchestrator = open_orchestrator(cli, |_| {})?;
    print_json(&orchestrator.sample_entropy(size, seeded))
}

fn cmd_quality(cli: &Cli) -> Result<()> {
    let orchestrator = open_orchestrator(cli, |_| {})?;
    println!("{:.4}", orchestrator.entropy_quality());
    Ok(())
}

fn cmd_validate(cli: &Cli, text: &str) -> Result<()> {
    let orchestrator = open_orchestrator(cli, |_| {})?;
    print_json(&orchestrator.validate_content(text))
}

fn cmd_inspect(cli: &Cli, session: Option<&str>) -> Result<()> {
    let orchestrator = open_orchestrator(cli, |_| {})?;
    match session {
        Some(id) => {
            let stats = orchestrator
                .memory_stats(id)
                .with_context(|| format!("no persisted state for session '{id}'"))?;
            print_json(&stats)
        }
        None => {
            let sessions = orchestrator.list_sessions();
            if sessions.is_empty() {
                println!("(no sessions)");
                return Ok(());
            }
            for id in sessions {
                match orchestrator.memory_stats(&id) {
                    Some(stats) => println!(
                        "{id}: version={}, entries={}, position={:.3}",
                        stats.version, stats.total, stats.last_ipoint_position
                    ),
                    None => println!("{id}: (not persisted)"),
                }
            }
            Ok(())
        }
    }
}
