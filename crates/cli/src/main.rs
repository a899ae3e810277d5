//! OpsAssist CLI — the main entry point.
//!
//! Commands:
//! - `run`      — Plan, execute, and verify a task
//! - `pricing`  — Show the model pricing table
//! - `config`   — Inspect or initialize configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "opsassist",
    about = "OpsAssist — plan, execute, and verify multi-step operations tasks",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task end to end
    Run {
        /// The task to run; prompts for it when omitted
        task: Option<String>,

        /// Don't write the cost report
        #[arg(long)]
        no_report: bool,

        /// Override the cost report path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show model pricing and free-tier limits
    Pricing,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            task,
            no_report,
            report,
        } => commands::run::run(task, !no_report, report).await?,
        Commands::Pricing => commands::pricing::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
