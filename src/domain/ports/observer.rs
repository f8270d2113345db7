//! Observer port - progress events and the human-intervention exchange.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::{AdversarialRecord, Candidate, EvaluationResult, TerminationReason};

/// Answer to a human-intervention request.
///
/// Deserializes from the structured form `{"type": "feedback", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum HumanResponse {
    /// Continue without changes.
    #[default]
    Skip,
    /// Replace the prompt with this text.
    Edit(String),
    /// Director feedback to be interpreted by the mutator.
    Feedback(String),
}

impl HumanResponse {
    /// Interpret raw terminal input: empty means skip, anything else is an edit.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Self::Skip
        } else {
            Self::Edit(trimmed.to_string())
        }
    }
}

/// Receives progress notifications from the evolution orchestrator.
///
/// Every method has a no-op default so hosts implement only what they need.
#[async_trait]
pub trait EvolutionObserver: Send + Sync {
    async fn on_run_start(&self, _initial_text: &str, _target_score: f64) {}

    async fn on_generation_start(&self, _generation: u32) {}

    async fn on_candidate_evaluated(&self, _candidate: &Candidate, _result: &EvaluationResult) {}

    async fn on_new_best(&self, _candidate: &Candidate, _score: f64) {}

    async fn on_adversarial_result(&self, _record: &AdversarialRecord) {}

    async fn on_run_complete(&self, _best: &Candidate, _reason: TerminationReason) {}

    /// Asked at the human gate with the current best and generation number.
    async fn request_human_input(&self, _best: &Candidate, _generation: u32) -> HumanResponse {
        HumanResponse::Skip
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

#[async_trait]
impl EvolutionObserver for NullObserver {}
