//! `evoprompt run`: optimize a prompt from scratch.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::commands::engine::{build_orchestrator, open_store};
use crate::cli::commands::runs::RunDetailOutput;
use crate::cli::observer::ConsoleObserver;
use crate::cli::output::output;
use crate::domain::models::{Config, OptimizationConfig};
use crate::services::load_suite;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// File holding the prompt to optimize
    #[arg(short, long)]
    pub prompt_file: PathBuf,

    /// Test suite file (YAML or JSON)
    #[arg(short, long)]
    pub suite: PathBuf,

    /// Maximum number of generations after the baseline
    #[arg(short = 'g', long)]
    pub max_generations: Option<u32>,

    /// Candidates generated per generation
    #[arg(short = 'n', long)]
    pub candidates: Option<u32>,

    /// Stop once the best score reaches this value (0.0 - 1.0)
    #[arg(short, long)]
    pub target: Option<f64>,

    /// Primary model for mutation and test execution
    #[arg(short, long)]
    pub model: Option<String>,

    /// Estimated spend limit in USD
    #[arg(short, long)]
    pub budget: Option<f64>,

    /// Mutation strategies, assigned round-robin (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub strategies: Vec<String>,

    /// Validation targets as provider:model (comma-separated)
    #[arg(long = "validate-with", value_delimiter = ',')]
    pub validate_with: Vec<String>,

    /// Ask for human input every N generations
    #[arg(long)]
    pub interactive_every: Option<u32>,

    /// Probe the best candidate adversarially every N generations
    #[arg(long)]
    pub adversarial_every: Option<u32>,
}

impl RunArgs {
    /// Layer command-line flags over the configured defaults.
    pub fn apply(&self, defaults: &OptimizationConfig) -> OptimizationConfig {
        let mut config = defaults.clone();
        if let Some(n) = self.max_generations {
            config.max_generations = n;
        }
        if let Some(n) = self.candidates {
            config.candidates_per_generation = n;
        }
        if let Some(target) = self.target {
            config.target_score = target;
        }
        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if self.budget.is_some() {
            config.budget_limit = self.budget;
        }
        if !self.strategies.is_empty() {
            config.strategies.clone_from(&self.strategies);
        }
        if !self.validate_with.is_empty() {
            config.validation_targets.clone_from(&self.validate_with);
        }
        if let Some(n) = self.interactive_every {
            config.interactive_every = n;
        }
        if let Some(n) = self.adversarial_every {
            config.adversarial_every = n;
        }
        config
    }
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let prompt = tokio::fs::read_to_string(&args.prompt_file)
        .await
        .with_context(|| format!("Failed to read prompt file {}", args.prompt_file.display()))?;
    let suite = load_suite(&args.suite)?;
    let optimization = args.apply(&config.optimization);

    let observer = Arc::new(ConsoleObserver::new(
        optimization.max_generations,
        json_mode,
        optimization.interactive_every > 0,
    ));
    let store = open_store(config).await?;
    let mut orchestrator = build_orchestrator(config, optimization, store, observer)?;

    let run = orchestrator.run(prompt.trim(), &suite).await?;

    let detail = RunDetailOutput::from_run(&run)
        .with_cost_summary(orchestrator.cost_tracker().format_summary());
    output(&detail, json_mode);
    Ok(())
}
