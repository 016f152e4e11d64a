//! # codebutler CLI
//!
//! Command-line interface for codebutler.
//!
//! ## Usage
//!
//! - `codebutler "task description"` - Plan and run a task to completion
//! - `codebutler abilities` - Show available abilities

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod output;

use commands::{abilities_command, run_command, RunOptions};
use config::CliConfigLoader;

/// codebutler - plan a task into steps and run them with an LLM
#[derive(Parser)]
#[command(name = "codebutler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Plan a task into steps and run them one at a time")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Protocol to use (openai, anthropic, azure_openai)
    #[arg(long)]
    protocol: Option<String>,

    /// API key override
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL override
    #[arg(long)]
    base_url: Option<String>,

    /// Model name override
    #[arg(long)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding one sub-directory of files per task
    #[arg(short, long, default_value = "workspace")]
    workspace: PathBuf,

    /// SQLite database for tasks and steps (kept in memory when omitted)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Maximum number of steps to execute
    #[arg(long)]
    max_turns: Option<usize>,

    /// Output trajectory file
    #[arg(long)]
    trajectory_file: Option<PathBuf>,

    /// Directory with prompt template overrides
    #[arg(long)]
    prompt_dir: Option<PathBuf>,

    /// Ask for confirmation before each step
    #[arg(long)]
    step: bool,

    /// The task to execute
    task: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show available abilities
    Abilities,
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(protocol) = &cli.protocol {
        loader = loader.with_protocol_override(protocol.clone());
    }

    if let Some(api_key) = &cli.api_key {
        loader = loader.with_api_key_override(api_key.clone());
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(model) = &cli.model {
        loader = loader.with_model_override(model.clone());
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_loader = build_config_loader(&cli);

    match (cli.task, cli.command) {
        (Some(task), None) => {
            let options = RunOptions {
                workspace: cli.workspace,
                database: cli.database,
                max_turns: cli.max_turns,
                trajectory_file: cli.trajectory_file,
                prompt_dir: cli.prompt_dir,
                step_mode: cli.step,
            };
            run_command(task, config_loader, options).await
        }
        (Some(_), Some(_)) => bail!("Cannot specify both a task and a subcommand"),
        (None, Some(Commands::Abilities)) => abilities_command(&cli.workspace),
        (None, None) => bail!("No task given. Run `codebutler --help` for usage"),
    }
}
