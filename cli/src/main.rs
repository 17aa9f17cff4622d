//! PortReaper CLI - Free ports held by unwanted processes
//!
//! Resolves which processes hold the configured ports, terminates them
//! and verifies that each port was actually released.

mod commands;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portreaper")]
#[command(author, version, about = "Free TCP ports held by unwanted processes")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: ./application.yml, then ~/.portreaper/application.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter, overridden by RUST_LOG when set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Kill whatever holds the ports and verify they are released (default)
    Sweep(SweepArgs),

    /// Show the sockets on the ports without killing anything
    #[command(alias = "ls")]
    List {
        /// Ports to inspect (default: configured ports)
        ports: Vec<u16>,

        /// Include sockets in every state, not only listening ones
        #[arg(long)]
        all_states: bool,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Args, Default)]
struct SweepArgs {
    /// Ports to free (default: configured ports)
    ports: Vec<u16>,

    /// Report what would be killed without killing
    #[arg(long)]
    dry_run: bool,

    /// Terminate gracefully and tolerate ports that stay held
    #[arg(long)]
    no_force: bool,

    /// Include sockets in every state, not only listening ones
    #[arg(long)]
    all_states: bool,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    Stdout,
    Stderr,
}

impl LogTarget {
    /// Logs share stdout with the report lines, except in JSON mode where
    /// stdout carries only the JSON document.
    fn for_output(json: bool) -> Self {
        if json {
            LogTarget::Stderr
        } else {
            LogTarget::Stdout
        }
    }

    fn is_terminal(self) -> bool {
        match self {
            LogTarget::Stdout => std::io::stdout().is_terminal(),
            LogTarget::Stderr => std::io::stderr().is_terminal(),
        }
    }
}

fn init_logging(level: &str, target: LogTarget) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(target.is_terminal());

    match target {
        LogTarget::Stdout => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stdout))
            .init(),
        LogTarget::Stderr => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, LogTarget::for_output(cli.json));

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Sweep(args)) => {
            commands::sweep::run(config_path, args.into(), cli.json).await?;
        }
        Some(Commands::List { ports, all_states }) => {
            commands::list::run(config_path, ports, all_states, cli.json).await?;
        }
        Some(Commands::Config) => {
            commands::config::show(config_path, cli.json).await?;
        }
        None => {
            commands::sweep::run(config_path, SweepArgs::default().into(), cli.json).await?;
        }
    }

    Ok(())
}

impl From<SweepArgs> for commands::Overrides {
    fn from(args: SweepArgs) -> Self {
        Self {
            ports: args.ports,
            dry_run: args.dry_run,
            no_force: args.no_force,
            all_states: args.all_states,
        }
    }
}
