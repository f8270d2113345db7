//! Assembles an orchestrator and run store from configuration.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::execution::LlmTestExecutor;
use crate::adapters::generation::GenerationRegistry;
use crate::adapters::sqlite::{initialize_database, SqliteRunStore};
use crate::domain::models::{Config, OptimizationConfig};
use crate::domain::ports::{EvolutionObserver, GenerationService, RunStore};
use crate::services::{
    AdversarialProbeGenerator, CostTracker, CrossProviderValidator, Evaluator,
    EvolutionOrchestrator, Mutator, ValidationTarget,
};

/// Open the configured run database, applying migrations.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteRunStore>> {
    let pool = initialize_database(&config.database)
        .await
        .with_context(|| format!("Failed to open run database at {}", config.database.path))?;
    Ok(Arc::new(SqliteRunStore::new(pool)))
}

fn evaluator_for(config: &Config, name: &str, service: Arc<dyn GenerationService>) -> Evaluator {
    let executor = LlmTestExecutor::new(service).with_name(name);
    Evaluator::new(Arc::new(executor)).with_case_timeout(config.timeouts.case())
}

/// Build an orchestrator for `optimization`, with backends for its primary
/// model and every validation target it names.
pub fn build_orchestrator(
    config: &Config,
    optimization: OptimizationConfig,
    store: Arc<dyn RunStore>,
    observer: Arc<dyn EvolutionObserver>,
) -> Result<EvolutionOrchestrator> {
    let registry = GenerationRegistry::new(config.generation.clone());
    let primary_id = registry.default_identifier(&optimization.model);
    let primary = registry
        .primary(&optimization.model)
        .with_context(|| format!("Failed to create generation backend '{primary_id}'"))?;

    let evaluator = evaluator_for(config, &primary_id, primary.clone());
    let mutator =
        Mutator::new(Some(primary.clone())).with_call_timeout(config.timeouts.generation());
    let adversarial = AdversarialProbeGenerator::new(Some(primary))
        .with_count(config.adversarial.case_count)
        .with_call_timeout(config.timeouts.generation());

    let targets = optimization
        .validation_targets
        .iter()
        .map(|name| {
            let service = registry
                .create(name)
                .with_context(|| format!("Failed to create validation target '{name}'"))?;
            Ok(ValidationTarget::new(name.clone(), evaluator_for(config, name, service)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut orchestrator =
        EvolutionOrchestrator::new(optimization, evaluator, mutator, store, CostTracker::new())
            .with_adversarial(adversarial)
            .with_observer(observer);

    if !targets.is_empty() {
        orchestrator = orchestrator.with_validator(
            CrossProviderValidator::new(targets)
                .with_target_timeout(config.timeouts.validation_target()),
        );
    }

    Ok(orchestrator)
}
