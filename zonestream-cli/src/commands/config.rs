//! Configuration CLI commands.
//!
//! `config path` shows where the streaming config is read from and
//! `config show` prints the effective settings as INI.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use zonestream::StreamingConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,

    /// Print the default configuration, ready to save as config.ini
    Defaults,
}

/// Default config location: `<config dir>/zonestream/config.ini`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zonestream").join("config.ini"))
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(path),
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Defaults => {
            print!("{}", StreamingConfig::default().to_ini_string());
            Ok(())
        }
    }
}

fn run_path(path: Option<&Path>) -> Result<(), CliError> {
    match path {
        Some(path) => {
            let marker = if path.exists() { "" } else { " (not created)" };
            println!("{}{}", path.display(), marker);
            Ok(())
        }
        None => Err(CliError::Config(
            "No config directory found on this platform. Use --config".to_string(),
        )),
    }
}

fn run_show(path: Option<&Path>) -> Result<(), CliError> {
    let config = match path {
        Some(path) if path.exists() => {
            println!("# {}", path.display());
            StreamingConfig::from_path(path)?
        }
        _ => {
            println!("# defaults");
            StreamingConfig::default()
        }
    };
    print!("{}", config.to_ini_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[budget]\nlimit_mb = 64\n").unwrap();

        assert!(run(ConfigCommands::Show, Some(&path)).is_ok());
    }

    #[test]
    fn test_show_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[budget]\nlimit_mb = plenty\n").unwrap();

        let err = run(ConfigCommands::Show, Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_path_requires_location() {
        assert!(run(ConfigCommands::Path, None).is_err());
    }
}
