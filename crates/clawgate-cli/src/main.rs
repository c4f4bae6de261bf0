//! `clawgate` -- CLI for the guarded agent tool layer.
//!
//! Provides the following subcommands:
//!
//! - `clawgate tools` -- List registered tools or show one tool's schema.
//! - `clawgate run` -- Invoke a tool with JSON arguments.
//! - `clawgate check` -- Dry-run the path or network guard.
//! - `clawgate config` -- Show the resolved configuration.
//!
//! Logs go to stderr; stdout carries only command output.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

/// Guarded agent tools: file, shell and web access behind safety checks.
#[derive(Parser)]
#[command(name = "clawgate", about = "Guarded agent tools CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Inspect registered tools.
    Tools {
        #[command(subcommand)]
        action: commands::tools_cmd::ToolsAction,
    },

    /// Invoke a tool and print its JSON result.
    Run(commands::run::RunArgs),

    /// Check a path or URL against the guards without touching it.
    Check {
        #[command(subcommand)]
        action: commands::check::CheckAction,
    },

    /// Show resolved configuration.
    Config {
        #[command(subcommand)]
        action: commands::config_cmd::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let loaded = commands::load_config(cli.config.as_deref()).await?;

    let ok = match cli.command {
        Commands::Tools { action } => commands::tools_cmd::run(action, &loaded.config)?,
        Commands::Run(args) => commands::run::run(args, &loaded.config).await?,
        Commands::Check { action } => commands::check::run(action, &loaded.config).await?,
        Commands::Config { action } => commands::config_cmd::run(action, &loaded)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
