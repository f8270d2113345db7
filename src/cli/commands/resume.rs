//! `evoprompt resume`: continue a stored run.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::commands::engine::{build_orchestrator, open_store};
use crate::cli::commands::runs::RunDetailOutput;
use crate::cli::observer::ConsoleObserver;
use crate::cli::output::output;
use crate::domain::models::Config;
use crate::domain::ports::RunStore;
use crate::services::load_suite;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Run ID or unique prefix
    pub id: String,

    /// Test suite file (YAML or JSON)
    #[arg(short, long)]
    pub suite: PathBuf,

    /// Generations to allow beyond the stored limit
    #[arg(short, long, default_value = "0")]
    pub extra_generations: u32,
}

pub async fn execute(args: ResumeArgs, config: &Config, json_mode: bool) -> Result<()> {
    let suite = load_suite(&args.suite)?;
    let store = open_store(config).await?;

    // The stored run decides which backends and validation targets to build.
    let stored = store.load_by_prefix(&args.id).await?;
    let max_generations = stored
        .config
        .max_generations
        .saturating_add(args.extra_generations);

    let observer = Arc::new(ConsoleObserver::new(
        max_generations,
        json_mode,
        stored.config.interactive_every > 0,
    ));
    let mut orchestrator = build_orchestrator(config, stored.config.clone(), store, observer)?;

    let run = orchestrator
        .resume(&stored.id.to_string(), &suite, args.extra_generations)
        .await?;

    let detail = RunDetailOutput::from_run(&run)
        .with_cost_summary(orchestrator.cost_tracker().format_summary());
    output(&detail, json_mode);
    Ok(())
}
