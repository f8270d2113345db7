//! Human and adversarial gates, run after a generation's checkpoint.

use tracing::{info, warn};

use super::generation::current_best;
use super::EvolutionOrchestrator;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    origin, AdversarialRecord, Candidate, OptimizationConfig, OptimizationRun, TestSuite,
};
use crate::domain::ports::HumanResponse;
use crate::services::cross_provider::CrossProviderValidator;

/// Two readings are requested for director feedback.
const DIRECTOR_READINGS: usize = 2;

impl EvolutionOrchestrator {
    /// Ask the observer for intervention when the cadence is due. Returns
    /// whether any candidate was added to the run.
    pub(super) async fn human_gate(
        &mut self,
        run: &mut OptimizationRun,
        generation: u32,
        suite: &TestSuite,
        validator: Option<&CrossProviderValidator>,
    ) -> DomainResult<bool> {
        if !OptimizationConfig::gate_due(run.config.interactive_every, generation) {
            return Ok(false);
        }

        let best = current_best(run)?;
        let candidates = match self.observer.request_human_input(&best, generation).await {
            HumanResponse::Skip => {
                info!(generation, "human gate skipped");
                return Ok(false);
            }
            HumanResponse::Edit(text) if text.trim().is_empty() => return Ok(false),
            HumanResponse::Edit(text) => {
                info!(generation, "human edit received");
                vec![Candidate::child_of(&best, generation, text, origin::HUMAN_EDIT)]
            }
            HumanResponse::Feedback(feedback) => {
                info!(generation, "director feedback received");
                let candidates = self
                    .mutator
                    .apply_director_feedback(&best, &feedback, generation)
                    .await;
                self.record_mutation_cost(
                    &best.text,
                    DIRECTOR_READINGS,
                    &candidates,
                    &run.config.model,
                );
                candidates
            }
        };

        self.evaluate_batch(run, candidates, suite, validator).await?;
        Ok(true)
    }

    /// Probe the current best with generated adversarial cases. The outcome
    /// is logged on the run but never influences selection.
    pub(super) async fn adversarial_gate(
        &self,
        run: &mut OptimizationRun,
        generation: u32,
        suite: &TestSuite,
    ) -> bool {
        if !OptimizationConfig::gate_due(run.config.adversarial_every, generation) {
            return false;
        }

        let Some(best) = run.best().cloned() else {
            return false;
        };

        let probes = self.adversarial.generate(&best.text).await;
        if probes.is_empty() {
            warn!(generation, "no adversarial probes generated");
            return false;
        }

        let auxiliary =
            suite.auxiliary(format!("{}-adversarial-g{generation}", suite.name), probes);
        let result = self.evaluator.evaluate(&best.text, &auxiliary).await;

        let record = AdversarialRecord {
            generation,
            candidate_id: best.id,
            score: result.score,
            case_count: auxiliary.len(),
            failures: result.failures,
        };
        info!(
            generation,
            score = record.score,
            cases = record.case_count,
            "adversarial probe complete"
        );

        self.observer.on_adversarial_result(&record).await;
        run.adversarial_log.push(record);
        true
    }
}
