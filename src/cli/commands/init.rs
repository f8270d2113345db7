//! Implementation of the `evoprompt init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::PROJECT_DIR;

const SAMPLE_PROMPT: &str = "Explain the concept the user asks about.\n";

const SAMPLE_SUITE: &str = r"name: sample
defaults:
  max_tokens: 512
cases:
  - id: recursion
    description: Mentions the base case
    input: What is recursion?
    assertions:
      - type: contains
        value: base case
        ignore_case: true
  - id: brevity
    input: Define a closure in one sentence.
    assertions:
      - type: max_length
        value: 400
        message: answer should be short
";

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite existing config and sample files
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub files_written: Vec<String>,
    pub database: String,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.files_written.is_empty() {
            lines.push("\nWrote:".to_string());
            for file in &self.files_written {
                lines.push(format!("  - {file}"));
            }
        }
        lines.push(format!("\nRun database: {}", self.database));
        lines.join("\n")
    }
}

async fn write_if_needed(
    root: &Path,
    relative: &str,
    content: &str,
    force: bool,
    written: &mut Vec<String>,
) -> Result<()> {
    let path = root.join(relative);
    if path.exists() && !force {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(relative.to_string());
    Ok(())
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let mut config = Config::default();
    let db_path = target_path.join(PROJECT_DIR).join("runs.db");
    let config_yaml =
        serde_yaml::to_string(&config).context("Failed to render default configuration")?;

    let mut files_written = Vec::new();
    write_if_needed(
        &target_path,
        &format!("{PROJECT_DIR}/config.yaml"),
        &config_yaml,
        args.force,
        &mut files_written,
    )
    .await?;
    write_if_needed(
        &target_path,
        &format!("{PROJECT_DIR}/suites/sample.yaml"),
        SAMPLE_SUITE,
        args.force,
        &mut files_written,
    )
    .await?;
    write_if_needed(
        &target_path,
        &format!("{PROJECT_DIR}/prompts/sample.txt"),
        SAMPLE_PROMPT,
        args.force,
        &mut files_written,
    )
    .await?;

    config.database.path = db_path.to_string_lossy().into_owned();
    initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;

    let message = if files_written.is_empty() {
        "Project already initialized. Use --force to overwrite.".to_string()
    } else {
        "Project initialized successfully.".to_string()
    };

    output(
        &InitOutput {
            success: true,
            message,
            initialized_path: target_path,
            files_written,
            database: config.database.path,
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::suite_loader::parse_suite_yaml;

    #[test]
    fn test_sample_suite_is_valid() {
        let suite = parse_suite_yaml(SAMPLE_SUITE).unwrap();
        assert_eq!(suite.name, "sample");
        assert_eq!(suite.len(), 2);
    }

    #[tokio::test]
    async fn test_init_writes_project_files() {
        let dir = tempfile::tempdir().unwrap();
        execute(
            InitArgs {
                force: false,
                path: dir.path().to_path_buf(),
            },
            true,
        )
        .await
        .unwrap();

        let project = dir.path().join(PROJECT_DIR);
        assert!(project.join("config.yaml").exists());
        assert!(project.join("suites/sample.yaml").exists());
        assert!(project.join("runs.db").exists());

        let config = crate::infrastructure::config::ConfigLoader::load_from_file(
            project.join("config.yaml"),
        )
        .unwrap();
        assert_eq!(config.optimization.max_generations, Config::default().optimization.max_generations);
    }
}
