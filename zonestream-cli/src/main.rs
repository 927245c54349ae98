//! ZoneStream CLI
//!
//! Inspect world definitions and run simulated hand-offs against the
//! streaming manager with in-process collaborators.
//!
//! ```bash
//! zonestream inspect --world demos/world.json
//! zonestream simulate --world demos/world.json --start atrium --to lab
//! zonestream simulate --world demos/world.json --start atrium --to lab --cancel
//! zonestream config path
//! ```

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zonestream::StreamingConfig;

use crate::commands::config::ConfigCommands;
use crate::commands::simulate::SimulateArgs;
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "zonestream")]
#[command(about = "Budgeted zone streaming with interactive transitions")]
#[command(version = zonestream::VERSION)]
struct Cli {
    /// Streaming config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show a world's zones, transitions and connectivity
    Inspect {
        /// World definition file (JSON)
        #[arg(short, long)]
        world: PathBuf,

        /// Depth used for the connected-zone listing
        #[arg(long, default_value = "2")]
        depth: usize,
    },

    /// Enter a zone and run a transition to another one
    Simulate(SimulateArgs),

    /// Inspect the streaming configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.clone().or_else(commands::config::default_config_path);

    match cli.command {
        Commands::Inspect { world, depth } => commands::inspect::run(&world, depth),
        Commands::Simulate(args) => {
            let config = load_config(config_path.as_deref(), cli.config.is_some())?;
            commands::simulate::run(args, config)
        }
        Commands::Config(command) => commands::config::run(command, config_path.as_deref()),
    }
}

/// Load the streaming config. A missing default file means defaults; a
/// missing explicitly named file is an error.
fn load_config(path: Option<&std::path::Path>, explicit: bool) -> Result<StreamingConfig, CliError> {
    match path {
        Some(path) if explicit || path.exists() => Ok(StreamingConfig::from_path(path)?),
        _ => Ok(StreamingConfig::default()),
    }
}
