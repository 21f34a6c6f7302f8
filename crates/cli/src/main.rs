//! Colloquy CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `.colloquy/config.toml` (or `--config`),
//!    apply environment overrides and validate it.
//! 2. **Wire observability**: configure `tracing-subscriber` on stderr and,
//!    when an OTLP endpoint is set, an OpenTelemetry exporter. All `tracing`
//!    spans and events emitted by every crate in the workspace flow through it.
//! 3. **Construct infrastructure**: the JSON file store and, for commands that
//!    need one, the OpenAI-compatible completion service; inject them into
//!    [`nodes::CollaborationService`] and [`nodes::AgentFactory`].
//! 4. **Dispatch the sub-command**. `collab send` is the streaming consumer: it
//!    writes one SSE `data:` frame per event to stdout and ends with
//!    `data: [DONE]`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;
mod config;
mod telemetry;

use config::Config;
use pipeline::CollaborationId;

#[derive(Debug, Parser)]
#[command(name = "colloquy", version, about = "Multi-agent collaboration pipeline")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, env = "COLLOQUY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage agent personas.
    #[command(subcommand)]
    Agent(AgentCommand),
    /// Manage and run collaborations.
    #[command(subcommand)]
    Collab(CollabCommand),
}

#[derive(Debug, Subcommand)]
enum AgentCommand {
    /// Generate an agent from a free-text description.
    Create {
        #[arg(long)]
        prompt: String,
    },
    /// Add an agent by hand.
    Add(AddAgent),
    /// List agents, newest first.
    List,
    /// Delete an agent.
    Remove { id: String },
}

#[derive(Debug, Args)]
struct AddAgent {
    #[arg(long)]
    name: String,
    #[arg(long)]
    expertise: String,
    #[arg(long)]
    system_prompt: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    personality: String,
    /// Mark the agent as the coordinator of any collaboration it joins.
    #[arg(long)]
    coordinator: bool,
}

#[derive(Debug, Subcommand)]
enum CollabCommand {
    /// Create a collaboration over existing agents.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// Agent id; repeat in roster order.
        #[arg(long = "agent", required = true)]
        agents: Vec<String>,
    },
    /// List collaborations, newest first.
    List,
    /// Print a collaboration as JSON.
    Show { id: CollaborationId },
    /// Send a message and stream the run as SSE frames.
    Send { id: CollaborationId, message: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let telemetry = telemetry::init(&config.telemetry)?;

    let result = commands::run(cli.command, &config).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }

    telemetry.shutdown();
    result
}
