//! Command-line interface.

pub mod commands;
pub mod observer;
pub mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::domain::errors::DomainError;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

use commands::init::InitArgs;
use commands::resume::ResumeArgs;
use commands::run::RunArgs;
use commands::runs::RunsArgs;

#[derive(Parser, Debug)]
#[command(name = "evoprompt")]
#[command(about = "Evolutionary prompt optimization", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Read configuration from this file instead of .evoprompt/
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .evoprompt/ with a default config, a sample suite and the run database
    Init(InitArgs),
    /// Optimize a prompt against a test suite
    Run(RunArgs),
    /// Continue a stored run
    Resume(ResumeArgs),
    /// Inspect stored runs
    Runs(RunsArgs),
}

/// Load configuration for the CLI: an explicit file, or the project
/// hierarchy with environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Print the error and exit. Configuration problems exit with 2.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let code = match err.downcast_ref::<DomainError>() {
        Some(DomainError::Configuration(_)) => 2,
        _ => 1,
    };

    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "evoprompt",
            "--json",
            "run",
            "--prompt-file",
            "p.txt",
            "--suite",
            "s.yaml",
            "--strategies",
            "persona,compression",
            "--budget",
            "0.5",
        ]);
        assert!(cli.json);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.strategies, vec!["persona", "compression"]);
        assert_eq!(args.budget, Some(0.5));
    }

    #[test]
    fn test_parse_runs_show() {
        let cli = Cli::parse_from(["evoprompt", "runs", "show", "3fa8"]);
        assert!(matches!(cli.command, Commands::Runs(_)));
    }
}
