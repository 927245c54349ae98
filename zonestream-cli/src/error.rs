//! CLI error type.

use std::process;

use thiserror::Error;
use zonestream::registry::RegistryError;
use zonestream::{ConfigError, ZoneError};

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("World error: {0}")]
    World(#[from] RegistryError),

    #[error("Streaming error: {0}")]
    Zone(#[from] ZoneError),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Runtime(e.to_string())
    }
}

impl CliError {
    /// Print the error and exit with a failure status.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        if let Some(hint) = self.hint() {
            eprintln!();
            eprintln!("Hint: {}", hint);
        }
        process::exit(1);
    }

    fn hint(&self) -> Option<String> {
        match self {
            CliError::Zone(e) => e.user_message(),
            CliError::World(RegistryError::Read { .. }) => Some(
                "Pass a world file with --world, e.g. demos/world.json".to_string(),
            ),
            _ => None,
        }
    }
}
