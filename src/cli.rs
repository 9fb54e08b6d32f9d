//! Command-line interface
//!
//! # Commands
//!
//! - `validate` - Parse and validate a tail configuration file

use crate::config::{LabelSource, TailConfig};
use crate::error::{Error, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// captail CLI
#[derive(Parser, Debug)]
#[command(name = "captail")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tail configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a tail configuration file and print the resolved setup
    Validate,
}

/// Executes CLI commands
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Validate => self.validate(),
        }
    }

    fn validate(&self) -> Result<()> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::missing_field("config"))?;
        let config = TailConfig::from_file(path)?;

        let label = match config.label_source()? {
            LabelSource::Static(tag) => format!("static '{tag}'"),
            LabelSource::Field { key, fallback } => {
                format!("field '{key}' (fallback '{fallback}')")
            }
        };

        println!("Configuration OK");
        println!("  collection: {}", config.collection);
        println!("  node:       {}", config.node_string());
        println!(
            "  mode:       {}",
            if config.is_persistent() {
                "persistent"
            } else {
                "non-persistent"
            }
        );
        println!("  label:      {label}");
        println!("  wait_time:  {}s", config.wait_time);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_validate_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.yaml");
        std::fs::write(
            &path,
            "collection: events\nhost: localhost\ntag: app.events\n",
        )
        .unwrap();

        let cli = Cli {
            config: Some(path),
            command: Commands::Validate,
        };
        assert!(Runner::new(cli).run().await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.yaml");
        std::fs::write(&path, "collection: events\nhost: localhost\n").unwrap();

        let cli = Cli {
            config: Some(path),
            command: Commands::Validate,
        };
        assert!(Runner::new(cli).run().await.is_err());
    }

    #[tokio::test]
    async fn test_validate_requires_config_path() {
        let cli = Cli {
            config: None,
            command: Commands::Validate,
        };
        assert!(Runner::new(cli).run().await.is_err());
    }
}
