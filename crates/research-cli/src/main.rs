//! Command-line interface for the research orchestrator

mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use research_agent::{CancellationToken, MemoryStore, ResearchConfig, ResearchOrchestrator};
use research_utils::{LogFormat, env_opt, init_tracing, load_env};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "research")]
#[command(version)]
#[command(about = "Autonomous investment research orchestrator", long_about = None)]
struct Cli {
    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Conduct one research run on a topic
    Run {
        /// Ticker or free-text topic, e.g. AAPL
        topic: String,

        /// JSON-lines memory log (defaults to RESEARCH_MEMORY_PATH)
        #[arg(long)]
        memory: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Chat model (defaults to OPENAI_MODEL or gpt-4o-mini)
        #[arg(long)]
        model: Option<String>,

        /// Let the regulatory specialist use reasoning calls
        #[arg(long)]
        llm_regulatory: bool,
    },

    /// List what previous runs on a topic taught
    History {
        topic: String,

        /// JSON-lines memory log (defaults to RESEARCH_MEMORY_PATH)
        #[arg(long)]
        memory: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Run {
            topic,
            memory,
            json,
            model,
            llm_regulatory,
        } => run(&topic, memory, json, model, llm_regulatory).await,
        Commands::History { topic, memory } => history(&topic, memory).await,
    }
}

async fn run(
    topic: &str,
    memory: Option<PathBuf>,
    json: bool,
    model: Option<String>,
    llm_regulatory: bool,
) -> Result<()> {
    let mut builder = ResearchConfig::builder()
        .with_env_all_keys()
        .regulatory_rule_based(!llm_regulatory);
    if let Some(path) = memory {
        builder = builder.memory_path(path);
    }
    if let Some(model) = model {
        builder = builder.model(model);
    }
    let config = builder.build().context("invalid configuration")?;

    let orchestrator = ResearchOrchestrator::from_config(&config)
        .await
        .context("failed to initialise the research orchestrator")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling research run");
            on_interrupt.cancel();
        }
    });

    info!(topic, model = %config.model, "Starting research");
    match orchestrator.conduct_research_with_cancel(topic, cancel).await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render::report_text(&report));
            }
            Ok(())
        }
        Err(failure) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&failure.partial)?);
            } else {
                eprint!("{}", render::failure_text(&failure));
            }
            Err(failure.into())
        }
    }
}

async fn history(topic: &str, memory: Option<PathBuf>) -> Result<()> {
    let path = memory
        .or_else(|| env_opt("RESEARCH_MEMORY_PATH").map(PathBuf::from))
        .context("no memory log given; pass --memory or set RESEARCH_MEMORY_PATH")?;

    let store = MemoryStore::open(&path)
        .await
        .with_context(|| format!("failed to open memory log {}", path.display()))?;
    let entries = store.recall(topic).await;
    print!("{}", render::history_text(topic, &entries));
    Ok(())
}
