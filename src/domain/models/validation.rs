//! Cross-provider validation results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score gap above which a candidate/target pair is flagged as overfit.
pub const OVERFIT_MARGIN: f64 = 0.2;

/// Score of one candidate on one validation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub target: String,
    pub score: f64,
    pub passed: u32,
    pub total: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub avg_latency_ms: f64,
}

impl ModelScore {
    /// Zero-score entry for a target that failed or timed out.
    pub fn failed(target: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            score: 0.0,
            passed: 0,
            total: 0,
            success: false,
            error: Some(error.into()),
            avg_latency_ms: 0.0,
        }
    }
}

/// Aggregated validation of one candidate across every configured target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Candidate score on the primary suite/backend.
    pub primary_score: f64,
    pub scores: BTreeMap<String, f64>,
    pub details: Vec<ModelScore>,
    /// Targets where `primary_score - target score > OVERFIT_MARGIN`.
    pub overfit_targets: Vec<String>,
}

impl ValidationReport {
    /// Fold per-target scores into a report, in the order given.
    pub fn from_scores(primary_score: f64, details: Vec<ModelScore>) -> Self {
        let scores = details
            .iter()
            .map(|d| (d.target.clone(), d.score))
            .collect();
        let overfit_targets = details
            .iter()
            .filter(|d| primary_score - d.score > OVERFIT_MARGIN)
            .map(|d| d.target.clone())
            .collect();

        Self {
            primary_score,
            scores,
            details,
            overfit_targets,
        }
    }

    pub fn is_overfit(&self) -> bool {
        !self.overfit_targets.is_empty()
    }
}
