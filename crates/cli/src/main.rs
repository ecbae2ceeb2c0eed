//! Glassbox CLI - Main Entry Point
//!
//! Runs a display server session for manual GUI testing and exposes the
//! allocator and platform checks the harness relies on.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use glassbox_cli::commands::{config, display, platform, port, run};
use glassbox_cli::output;

/// Glassbox - display-server sessions for remote GUI testing
#[derive(Parser)]
#[command(name = "glassbox")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "glassbox.toml", env = "GLASSBOX_CONFIG", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a server hosting an application and keep it up until Ctrl-C
    Run(run::RunArgs),

    /// Allocate a free TCP port
    Port,

    /// Allocate a free X11 display number (Linux/X11 only)
    Display(display::DisplayArgs),

    /// Show what this platform supports
    Platform,

    /// Manage the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => run::execute(args, &cli.config).await?,
        Commands::Port => port::execute(cli.format)?,
        Commands::Display(args) => display::execute(args, &cli.config, cli.format)?,
        Commands::Platform => platform::execute(cli.format),
        Commands::Config(cmd) => config::execute(cmd, &cli.config)?,
        Commands::Version => {
            println!("Glassbox CLI v{}", glassbox_common::VERSION);
            println!("Platform: {}", glassbox_common::Platform::current());
        }
    }

    Ok(())
}
