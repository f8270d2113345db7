//! The generation loop: stop checks, mutation, evaluation and promotion.

use tracing::{info, warn};
use uuid::Uuid;

use super::{EvolutionOrchestrator, MUTATION_OVERHEAD_TOKENS};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Candidate, OptimizationRun, TerminationReason, TestSuite, CROSS_VALIDATION_KEY,
};
use crate::services::cost_tracker::estimate_tokens;
use crate::services::cross_provider::CrossProviderValidator;

impl EvolutionOrchestrator {
    /// Run generations until a stop condition holds.
    pub(super) async fn evolve(
        &mut self,
        run: &mut OptimizationRun,
        suite: &TestSuite,
        validator: Option<&CrossProviderValidator>,
    ) -> DomainResult<TerminationReason> {
        loop {
            let best = current_best(run)?;
            let best_score = best.score().unwrap_or_default();

            if best_score >= run.config.target_score {
                return Ok(TerminationReason::TargetReached);
            }
            if let Some(limit) = run.config.budget_limit {
                if self.cost.estimated_cost() >= limit {
                    info!(cost = self.cost.estimated_cost(), limit, "budget exhausted");
                    return Ok(TerminationReason::BudgetExhausted);
                }
            }

            let generation = run.next_generation();
            if generation > run.config.max_generations {
                return Ok(TerminationReason::MaxGenerationsReached);
            }

            self.observer.on_generation_start(generation).await;
            info!(generation, best_score, "starting generation");

            let failures = best
                .evaluation
                .as_ref()
                .map(|e| e.failures.clone())
                .unwrap_or_default();
            let count = run.config.candidates_per_generation as usize;
            let children = self
                .mutator
                .generate(&best, generation, count, &run.config.strategies, &failures)
                .await;

            self.record_mutation_cost(&best.text, count, &children, &run.config.model);
            run.total_cost = self.cost.estimated_cost();

            if let Some(limit) = run.config.budget_limit {
                if self.cost.estimated_cost() > limit {
                    warn!(
                        generation,
                        cost = self.cost.estimated_cost(),
                        limit,
                        "mutation cost exceeded budget, discarding unevaluated batch"
                    );
                    return Ok(TerminationReason::BudgetExhausted);
                }
            }

            run.open_generation();
            self.evaluate_batch(run, children, suite, validator).await?;
            self.checkpoint(run).await?;

            let human = self.human_gate(run, generation, suite, validator).await?;
            let adversarial = self.adversarial_gate(run, generation, suite).await;
            if human || adversarial {
                self.checkpoint(run).await?;
            }

            info!(
                generation,
                best_score = run.best_score().unwrap_or_default(),
                cost = self.cost.estimated_cost(),
                "generation complete"
            );
        }
    }

    /// Evaluate `candidates` in order, folding each into its generation and
    /// promoting any that beat the best so far.
    pub(super) async fn evaluate_batch(
        &self,
        run: &mut OptimizationRun,
        candidates: Vec<Candidate>,
        suite: &TestSuite,
        validator: Option<&CrossProviderValidator>,
    ) -> DomainResult<()> {
        for mut candidate in candidates {
            let result = self.evaluator.evaluate(&candidate.text, suite).await;
            candidate.record_evaluation(result.clone())?;
            self.observer
                .on_candidate_evaluated(&candidate, &result)
                .await;

            tracing::debug!(
                candidate = %candidate.short_id(),
                origin = %candidate.origin,
                score = result.score,
                "candidate evaluated"
            );

            let best_score = run.best_score().unwrap_or(f64::NEG_INFINITY);
            let id = candidate.id;
            run.push_candidate(candidate)?;

            if result.score > best_score {
                self.promote(run, id, result.score, suite, validator)
                    .await?;
            }
        }
        Ok(())
    }

    /// Make `id` the current best and, when targets are configured, validate
    /// it across providers before returning.
    async fn promote(
        &self,
        run: &mut OptimizationRun,
        id: Uuid,
        score: f64,
        suite: &TestSuite,
        validator: Option<&CrossProviderValidator>,
    ) -> DomainResult<()> {
        run.best_candidate_id = Some(id);

        if let Some(validator) = validator {
            let candidate = run
                .candidate(id)
                .cloned()
                .ok_or_else(|| DomainError::InvalidState(format!("candidate {id} vanished")))?;
            let report = validator.validate(&candidate, score, suite).await;
            let value = serde_json::to_value(&report)?;
            if let Some(stored) = run.candidate_mut(id) {
                stored.metadata.insert(CROSS_VALIDATION_KEY.to_string(), value);
            }
        }

        if let Some(best) = run.candidate(id) {
            info!(
                candidate = %best.short_id(),
                origin = %best.origin,
                score,
                "new best candidate"
            );
            self.observer.on_new_best(best, score).await;
        }
        Ok(())
    }

    /// Charge the estimated cost of producing `children` from `parent_text`.
    pub(super) fn record_mutation_cost(
        &mut self,
        parent_text: &str,
        requested: usize,
        children: &[Candidate],
        model: &str,
    ) -> f64 {
        let input_tokens =
            (estimate_tokens(parent_text) + MUTATION_OVERHEAD_TOKENS) * requested as u64;
        let output_tokens = children.iter().map(|c| estimate_tokens(&c.text)).sum();
        self.cost.add_usage(input_tokens, output_tokens, model)
    }
}

pub(super) fn current_best(run: &OptimizationRun) -> DomainResult<Candidate> {
    run.best()
        .cloned()
        .ok_or_else(|| DomainError::InvalidState(format!("run {} has no best candidate", run.id)))
}
