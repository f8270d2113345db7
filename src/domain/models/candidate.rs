//! Candidate prompts and their evaluation outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Origin tags for candidates not produced by a mutation strategy.
pub mod origin {
    /// The unmodified input text of a run.
    pub const BASELINE: &str = "baseline";
    /// Free-text replacement supplied at the human gate.
    pub const HUMAN_EDIT: &str = "human_edit";
    /// Literal reading of director feedback.
    pub const DIRECTOR_LITERAL: &str = "director_literal";
    /// Creative reading of director feedback.
    pub const DIRECTOR_CREATIVE: &str = "director_creative";
    /// Parent annotated with feedback when no generation service answered.
    pub const DIRECTOR_FALLBACK: &str = "director_feedback_fallback";
}

/// Metadata key under which cross-provider validation is attached.
pub const CROSS_VALIDATION_KEY: &str = "cross_validation";

/// Aggregated outcome of running a test suite against one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// passed / total, 0.0 for an empty suite.
    pub score: f64,
    pub passed: u32,
    pub failed: u32,
    pub errors: u32,
    pub total: u32,
    /// Mean case duration in milliseconds.
    pub avg_latency_ms: f64,
    /// Human-readable failure lines, in case order.
    #[serde(default)]
    pub failures: Vec<String>,
}

impl EvaluationResult {
    /// Build a result from raw counts. `failed` is derived as
    /// `total - passed - errors`.
    pub fn from_counts(
        total: u32,
        passed: u32,
        errors: u32,
        avg_latency_ms: f64,
        failures: Vec<String>,
    ) -> Self {
        let score = if total == 0 {
            0.0
        } else {
            f64::from(passed) / f64::from(total)
        };

        Self {
            score,
            passed,
            failed: total.saturating_sub(passed).saturating_sub(errors),
            errors,
            total,
            avg_latency_ms,
            failures,
        }
    }

    /// Every case ended in a system error, so the score carries no signal.
    pub fn is_unusable(&self) -> bool {
        self.total > 0 && self.errors == self.total
    }
}

/// One versioned prompt text with lineage and evaluation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub generation: u32,
    /// Id of the candidate this one was derived from. Never an object pointer.
    pub parent_id: Option<Uuid>,
    pub text: String,
    /// Strategy name or origin tag (see [`origin`]).
    pub origin: String,
    #[serde(default)]
    pub evaluation: Option<EvaluationResult>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(
        generation: u32,
        parent_id: Option<Uuid>,
        text: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            parent_id,
            text: text.into(),
            origin: origin.into(),
            evaluation: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// The unmodified input of a run, always generation 0.
    pub fn baseline(text: impl Into<String>) -> Self {
        Self::new(0, None, text, origin::BASELINE)
    }

    /// Derive a child of `parent` in `generation`.
    pub fn child_of(
        parent: &Candidate,
        generation: u32,
        text: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self::new(generation, Some(parent.id), text, origin)
    }

    /// Score of the attached evaluation, if any.
    pub fn score(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|e| e.score)
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluation.is_some()
    }

    /// Attach the evaluation. A candidate is scored at most once.
    pub fn record_evaluation(&mut self, result: EvaluationResult) -> DomainResult<()> {
        if self.evaluation.is_some() {
            return Err(DomainError::InvalidState(format!(
                "candidate {} already evaluated",
                self.id
            )));
        }
        self.evaluation = Some(result);
        Ok(())
    }

    /// Short id used in logs and CLI output.
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_counts_derives_failed() {
        let result = EvaluationResult::from_counts(4, 2, 1, 10.0, vec![]);
        assert_eq!(result.failed, 1);
        assert!((result.score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_suite_scores_zero() {
        let result = EvaluationResult::from_counts(0, 0, 0, 0.0, vec![]);
        assert!(result.score.abs() < f64::EPSILON);
        assert!(!result.is_unusable());
    }

    #[test]
    fn test_all_errors_is_unusable() {
        let result = EvaluationResult::from_counts(3, 0, 3, 0.0, vec![]);
        assert!(result.is_unusable());
    }

    #[test]
    fn test_evaluation_set_once() {
        let mut candidate = Candidate::baseline("Explain recursion");
        let result = EvaluationResult::from_counts(1, 1, 0, 1.0, vec![]);
        candidate.record_evaluation(result.clone()).unwrap();
        assert!(candidate.record_evaluation(result).is_err());
        assert_eq!(candidate.score(), Some(1.0));
    }

    #[test]
    fn test_child_keeps_parent_id_only() {
        let parent = Candidate::baseline("p");
        let child = Candidate::child_of(&parent, 1, "c", "persona");
        assert_eq!(child.parent_id, Some(parent.id));
        assert_eq!(child.generation, 1);
        assert_ne!(child.id, parent.id);
    }
}
