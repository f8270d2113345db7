//! Evolution Orchestrator
//!
//! Drives an optimization run through its states:
//!
//! ```text
//! INIT -> BASELINE_EVAL -> { MUTATE -> EVALUATE -> SELECT -> CHECKPOINT
//!                            -> [HUMAN_GATE] -> [ADVERSARIAL_GATE] }*
//!      -> TERMINATED(target_reached | budget_exhausted | max_generations_reached)
//! ```
//!
//! The loop is elitist hill climbing: every generation mutates the single
//! best-known candidate, and a child replaces it only with a strictly higher
//! score. Everything runs sequentially on the caller's task except
//! cross-provider validation, which fans out one task per target and is
//! awaited before the next candidate is evaluated.

mod gates;
mod generation;

use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Candidate, OptimizationConfig, OptimizationRun, RunStatus, TerminationReason, TestSuite,
};
use crate::domain::ports::{EvolutionObserver, NullObserver, RunStore};
use crate::services::adversarial::AdversarialProbeGenerator;
use crate::services::cost_tracker::CostTracker;
use crate::services::cross_provider::CrossProviderValidator;
use crate::services::evaluator::Evaluator;
use crate::services::mutation::Mutator;

/// Estimated prompt overhead, in tokens, of one mutation request.
pub const MUTATION_OVERHEAD_TOKENS: u64 = 200;

/// State machine tying the mutator, evaluator, validator, probe generator,
/// cost tracker and run store together.
pub struct EvolutionOrchestrator {
    config: OptimizationConfig,
    evaluator: Evaluator,
    mutator: Mutator,
    store: Arc<dyn RunStore>,
    cost: CostTracker,
    validator: Option<CrossProviderValidator>,
    adversarial: AdversarialProbeGenerator,
    observer: Arc<dyn EvolutionObserver>,
}

impl EvolutionOrchestrator {
    pub fn new(
        config: OptimizationConfig,
        evaluator: Evaluator,
        mutator: Mutator,
        store: Arc<dyn RunStore>,
        cost: CostTracker,
    ) -> Self {
        Self {
            config,
            evaluator,
            mutator,
            store,
            cost,
            validator: None,
            adversarial: AdversarialProbeGenerator::new(None),
            observer: Arc::new(NullObserver),
        }
    }

    /// Validation targets available to runs. Which ones run is decided by
    /// the run's `validation_targets`.
    pub fn with_validator(mut self, validator: CrossProviderValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_adversarial(mut self, generator: AdversarialProbeGenerator) -> Self {
        self.adversarial = generator;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EvolutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    pub fn cost_tracker(&self) -> &CostTracker {
        &self.cost
    }

    /// Optimize `initial_text` against `suite` from scratch.
    ///
    /// Configuration problems are reported before anything is persisted.
    /// Once the run exists it is saved on every exit path, including fatal
    /// errors.
    #[instrument(skip(self, initial_text, suite), fields(suite = %suite.name))]
    pub async fn run(
        &mut self,
        initial_text: &str,
        suite: &TestSuite,
    ) -> DomainResult<OptimizationRun> {
        let config = self.config.clone();
        let validator = self.preflight(&config)?;
        self.cost.restore(0.0);

        let mut run = OptimizationRun::new(config);
        info!(
            run_id = %run.id,
            target = run.config.target_score,
            executor = self.evaluator.executor_name(),
            "starting optimization run"
        );
        self.observer
            .on_run_start(initial_text, run.config.target_score)
            .await;

        if let Err(e) = self.evaluate_baseline(&mut run, initial_text, suite).await {
            return self.finish(run, Err(e)).await;
        }

        let outcome = self.evolve(&mut run, suite, validator.as_ref()).await;
        self.finish(run, outcome).await
    }

    /// Continue a persisted run identified by `run_id` (a full id or unique
    /// prefix), optionally allowing `extra_generations` more generations.
    ///
    /// The best candidate is re-derived from the full history rather than
    /// taken from the stored pointer.
    #[instrument(skip(self, suite), fields(suite = %suite.name))]
    pub async fn resume(
        &mut self,
        run_id: &str,
        suite: &TestSuite,
        extra_generations: u32,
    ) -> DomainResult<OptimizationRun> {
        let mut run = self.store.load_by_prefix(run_id).await?;
        if extra_generations > 0 {
            run.config.max_generations = run
                .config
                .max_generations
                .saturating_add(extra_generations);
        }

        let validator = self.preflight(&run.config)?;
        self.cost.restore(run.total_cost);

        let best = run
            .scan_best()
            .cloned()
            .ok_or_else(|| DomainError::CorruptRun(run.id.to_string()))?;
        run.best_candidate_id = Some(best.id);
        run.status = RunStatus::Running;
        run.termination = None;

        info!(
            run_id = %run.id,
            next_generation = run.next_generation(),
            max_generations = run.config.max_generations,
            best_score = best.score().unwrap_or_default(),
            "resuming optimization run"
        );
        self.observer
            .on_run_start(&best.text, run.config.target_score)
            .await;

        let outcome = self.evolve(&mut run, suite, validator.as_ref()).await;
        self.finish(run, outcome).await
    }

    /// Check names and ranges before any work happens, and pick the
    /// validation targets this run uses.
    fn preflight(
        &self,
        config: &OptimizationConfig,
    ) -> DomainResult<Option<CrossProviderValidator>> {
        config.validate()?;
        self.mutator.check_strategies(&config.strategies)?;

        if config.validation_targets.is_empty() {
            return Ok(None);
        }

        let Some(validator) = &self.validator else {
            return Err(DomainError::Configuration(format!(
                "validation targets configured but none available: {}",
                config.validation_targets.join(", ")
            )));
        };

        validator
            .select(&config.validation_targets)
            .map(Some)
            .map_err(|missing| {
                DomainError::Configuration(format!(
                    "unknown validation targets: {} (available: {})",
                    missing.join(", "),
                    validator.target_names().join(", ")
                ))
            })
    }

    /// Generation 0: exactly one unmodified candidate, evaluated and made
    /// the current best. A baseline where every case errored is fatal.
    async fn evaluate_baseline(
        &mut self,
        run: &mut OptimizationRun,
        initial_text: &str,
        suite: &TestSuite,
    ) -> DomainResult<()> {
        run.open_generation();
        let mut baseline = Candidate::baseline(initial_text);
        let result = self.evaluator.evaluate(&baseline.text, suite).await;
        baseline.record_evaluation(result.clone())?;
        self.observer
            .on_candidate_evaluated(&baseline, &result)
            .await;

        let baseline_id = baseline.id;
        run.push_candidate(baseline)?;

        if result.is_unusable() {
            let detail = result
                .failures
                .first()
                .cloned()
                .unwrap_or_else(|| "every case errored".to_string());
            return Err(DomainError::BaselineEvaluationFailed(detail));
        }

        run.best_candidate_id = Some(baseline_id);
        info!(score = result.score, "baseline evaluated");
        self.checkpoint(run).await
    }

    /// Overwrite the stored copy of `run` with its current state.
    async fn checkpoint(&self, run: &mut OptimizationRun) -> DomainResult<()> {
        run.total_cost = self.cost.estimated_cost();
        run.touch();
        self.store.save(run).await?;
        tracing::debug!(
            run_id = %run.id,
            generations = run.generations.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Persist the final state and notify the observer. On a fatal error the
    /// save is still attempted and the original error returned.
    async fn finish(
        &mut self,
        mut run: OptimizationRun,
        outcome: DomainResult<TerminationReason>,
    ) -> DomainResult<OptimizationRun> {
        run.total_cost = self.cost.estimated_cost();
        run.touch();

        match outcome {
            Ok(reason) => {
                run.status = RunStatus::Completed;
                run.termination = Some(reason);
                self.store.save(&run).await?;

                info!(
                    run_id = %run.id,
                    reason = %reason,
                    best_score = run.best_score().unwrap_or_default(),
                    cost = run.total_cost,
                    "optimization run finished"
                );
                if let Some(best) = run.best() {
                    self.observer.on_run_complete(best, reason).await;
                }
                Ok(run)
            }
            Err(e) => {
                run.status = RunStatus::Failed;
                if let Err(save_err) = self.store.save(&run).await {
                    error!(run_id = %run.id, error = %save_err, "failed to save aborted run");
                }
                error!(run_id = %run.id, error = %e, "optimization run aborted");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRunStore;
    use crate::domain::models::{CaseExecution, SuiteDefaults, TestCase};
    use crate::domain::ports::{ExecutionError, TestExecutor};
    use crate::services::cross_provider::ValidationTarget;
    use async_trait::async_trait;

    struct Always(bool);

    #[async_trait]
    impl TestExecutor for Always {
        fn name(&self) -> &str {
            "always"
        }

        async fn run(
            &self,
            _candidate_text: &str,
            _case: &TestCase,
            _defaults: &SuiteDefaults,
        ) -> Result<CaseExecution, ExecutionError> {
            Ok(CaseExecution {
                passed: self.0,
                ..Default::default()
            })
        }
    }

    struct Down;

    #[async_trait]
    impl TestExecutor for Down {
        fn name(&self) -> &str {
            "down"
        }

        async fn run(
            &self,
            _candidate_text: &str,
            _case: &TestCase,
            _defaults: &SuiteDefaults,
        ) -> Result<CaseExecution, ExecutionError> {
            Err(ExecutionError::Unavailable("offline".into()))
        }
    }

    fn orchestrator(
        config: OptimizationConfig,
        executor: Arc<dyn TestExecutor>,
        store: Arc<InMemoryRunStore>,
    ) -> EvolutionOrchestrator {
        EvolutionOrchestrator::new(
            config,
            Evaluator::new(executor),
            Mutator::new(None),
            store,
            CostTracker::new(),
        )
    }

    fn suite() -> TestSuite {
        TestSuite::new("unit", vec![TestCase::new("c1", "x")])
    }

    #[tokio::test]
    async fn test_unknown_strategy_rejected_before_run() {
        let store = Arc::new(InMemoryRunStore::new());
        let config = OptimizationConfig {
            strategies: vec!["telepathy".to_string()],
            ..Default::default()
        };
        let mut orch = orchestrator(config, Arc::new(Always(true)), Arc::clone(&store));

        let err = orch.run("p", &suite()).await.unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_validation_target_rejected() {
        let store = Arc::new(InMemoryRunStore::new());
        let config = OptimizationConfig {
            validation_targets: vec!["openai:gpt-4o".to_string()],
            ..Default::default()
        };
        let mut orch = orchestrator(config, Arc::new(Always(true)), store).with_validator(
            CrossProviderValidator::new(vec![ValidationTarget::new(
                "mock",
                Evaluator::new(Arc::new(Always(true))),
            )]),
        );

        let err = orch.run("p", &suite()).await.unwrap_err();
        assert!(err.to_string().contains("openai:gpt-4o"));
    }

    #[tokio::test]
    async fn test_baseline_failure_is_fatal_but_saved() {
        let store = Arc::new(InMemoryRunStore::new());
        let mut orch = orchestrator(
            OptimizationConfig::default(),
            Arc::new(Down),
            Arc::clone(&store),
        );

        let err = orch.run("p", &suite()).await.unwrap_err();
        assert!(matches!(err, DomainError::BaselineEvaluationFailed(_)));

        let runs = store.list().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].generation_count, 1);
    }

    #[tokio::test]
    async fn test_baseline_at_target_stops_immediately() {
        let store = Arc::new(InMemoryRunStore::new());
        let mut orch = orchestrator(
            OptimizationConfig::default(),
            Arc::new(Always(true)),
            store,
        );

        let run = orch.run("already perfect", &suite()).await.unwrap();
        assert_eq!(run.termination, Some(TerminationReason::TargetReached));
        assert_eq!(run.generations.len(), 1);
        assert_eq!(run.best().unwrap().text, "already perfect");
    }

    #[tokio::test]
    async fn test_max_generations_is_a_hard_bound() {
        let store = Arc::new(InMemoryRunStore::new());
        let config = OptimizationConfig {
            max_generations: 2,
            candidates_per_generation: 2,
            ..Default::default()
        };
        let mut orch = orchestrator(config, Arc::new(Always(false)), store);

        let run = orch.run("p", &suite()).await.unwrap();
        assert_eq!(
            run.termination,
            Some(TerminationReason::MaxGenerationsReached)
        );
        assert_eq!(run.generations.len(), 3);
        assert!(run.generations[1..].iter().all(|pool| pool.len() == 2));
    }
}
