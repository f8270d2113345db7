//! Optimization runs: configuration snapshot plus append-only generation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::candidate::Candidate;
use crate::domain::errors::{DomainError, DomainResult};

/// Parameters of one optimization run. Snapshotted into the run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizationConfig {
    /// Highest generation number the loop may produce.
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,

    #[serde(default = "default_candidates_per_generation")]
    pub candidates_per_generation: u32,

    /// Stop as soon as the best score reaches this value.
    #[serde(default = "default_target_score")]
    pub target_score: f64,

    /// Model identifier used for generation and cost estimation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Estimated spend ceiling in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_limit: Option<f64>,

    /// Human gate cadence in generations, 0 disables.
    #[serde(default)]
    pub interactive_every: u32,

    /// Adversarial gate cadence in generations, 0 disables.
    #[serde(default)]
    pub adversarial_every: u32,

    /// Mutation strategy names, assigned round-robin.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,

    /// Validation target identifiers for cross-provider checks.
    #[serde(default)]
    pub validation_targets: Vec<String>,
}

const fn default_max_generations() -> u32 {
    5
}

const fn default_candidates_per_generation() -> u32 {
    3
}

const fn default_target_score() -> f64 {
    1.0
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_strategies() -> Vec<String> {
    vec![
        "refinement".to_string(),
        "chain_of_thought".to_string(),
        "persona".to_string(),
    ]
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
            candidates_per_generation: default_candidates_per_generation(),
            target_score: default_target_score(),
            model: default_model(),
            budget_limit: None,
            interactive_every: 0,
            adversarial_every: 0,
            strategies: default_strategies(),
            validation_targets: Vec::new(),
        }
    }
}

impl OptimizationConfig {
    /// Range sanity checks performed before a run starts.
    pub fn validate(&self) -> DomainResult<()> {
        if self.max_generations == 0 {
            return Err(DomainError::Configuration(
                "max_generations must be at least 1".to_string(),
            ));
        }
        if self.candidates_per_generation == 0 {
            return Err(DomainError::Configuration(
                "candidates_per_generation must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.target_score) {
            return Err(DomainError::Configuration(format!(
                "target_score {} must be within [0, 1]",
                self.target_score
            )));
        }
        if let Some(budget) = self.budget_limit {
            if !budget.is_finite() || budget < 0.0 {
                return Err(DomainError::Configuration(format!(
                    "budget_limit {budget} must be a non-negative amount"
                )));
            }
        }
        if self.model.trim().is_empty() {
            return Err(DomainError::Configuration(
                "model identifier cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// `generation` is a positive multiple of `every`.
    pub fn gate_due(every: u32, generation: u32) -> bool {
        every > 0 && generation > 0 && generation % every == 0
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    TargetReached,
    BudgetExhausted,
    MaxGenerationsReached,
}

impl TerminationReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TargetReached => "target_reached",
            Self::BudgetExhausted => "budget_exhausted",
            Self::MaxGenerationsReached => "max_generations_reached",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one adversarial gate. Observational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialRecord {
    pub generation: u32,
    pub candidate_id: Uuid,
    pub score: f64,
    pub case_count: usize,
    #[serde(default)]
    pub failures: Vec<String>,
}

/// Listing entry for a persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub generation_count: usize,
    pub best_score: Option<f64>,
    pub model: String,
    pub status: RunStatus,
}

/// The full record of one optimization session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub id: Uuid,
    pub config: OptimizationConfig,
    /// Generation `n` lives at index `n`; generation 0 holds the baseline.
    pub generations: Vec<Vec<Candidate>>,
    pub best_candidate_id: Option<Uuid>,
    pub total_cost: f64,
    pub status: RunStatus,
    #[serde(default)]
    pub termination: Option<TerminationReason>,
    #[serde(default)]
    pub adversarial_log: Vec<AdversarialRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OptimizationRun {
    pub fn new(config: OptimizationConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            config,
            generations: Vec::new(),
            best_candidate_id: None,
            total_cost: 0.0,
            status: RunStatus::Running,
            termination: None,
            adversarial_log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of the generation the loop would produce next.
    pub fn next_generation(&self) -> u32 {
        u32::try_from(self.generations.len()).unwrap_or(u32::MAX)
    }

    /// Open a new, empty generation and return its number.
    pub fn open_generation(&mut self) -> u32 {
        let number = self.next_generation();
        self.generations.push(Vec::new());
        number
    }

    /// Append a candidate to the generation its `generation` field names.
    pub fn push_candidate(&mut self, candidate: Candidate) -> DomainResult<()> {
        let index = candidate.generation as usize;
        let pool = self.generations.get_mut(index).ok_or_else(|| {
            DomainError::InvalidState(format!(
                "generation {} is not open for candidate {}",
                candidate.generation, candidate.id
            ))
        })?;
        pool.push(candidate);
        Ok(())
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.generations.iter().flatten()
    }

    pub fn candidate(&self, id: Uuid) -> Option<&Candidate> {
        self.candidates().find(|c| c.id == id)
    }

    pub fn candidate_mut(&mut self, id: Uuid) -> Option<&mut Candidate> {
        self.generations.iter_mut().flatten().find(|c| c.id == id)
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.best_candidate_id.and_then(|id| self.candidate(id))
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best().and_then(Candidate::score)
    }

    /// Highest scoring evaluated candidate. Ties keep the earliest one.
    pub fn scan_best(&self) -> Option<&Candidate> {
        self.candidates()
            .filter(|c| c.is_evaluated())
            .fold(None, |best: Option<&Candidate>, c| match best {
                Some(b) if b.score() >= c.score() => Some(b),
                _ => Some(c),
            })
    }

    /// Cumulative best score after each generation.
    pub fn best_score_history(&self) -> Vec<f64> {
        let mut running = f64::NEG_INFINITY;
        self.generations
            .iter()
            .map(|pool| {
                for score in pool.iter().filter_map(Candidate::score) {
                    running = running.max(score);
                }
                running
            })
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id,
            updated_at: self.updated_at,
            generation_count: self.generations.len(),
            best_score: self.best_score(),
            model: self.config.model.clone(),
            status: self.status,
        }
    }
}
