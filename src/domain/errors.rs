//! Domain errors for the evoprompt optimization engine.

use thiserror::Error;

/// Format the run ids an ambiguous prefix matched: `a, b, c`.
fn format_matches(matches: &[String]) -> String {
    matches.join(", ")
}

/// Domain-level errors that can occur while optimizing a prompt.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Service error: {0}")]
    TransientService(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Ambiguous run id prefix '{prefix}': matches {}", format_matches(.matches))]
    AmbiguousRunId { prefix: String, matches: Vec<String> },

    #[error("Corrupt run {0}: no evaluated candidates")]
    CorruptRun(String),

    #[error("Baseline evaluation failed: {0}")]
    BaselineEvaluationFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Persistence(format!("serialization: {err}"))
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_prefix_lists_matches() {
        let err = DomainError::AmbiguousRunId {
            prefix: "ab".to_string(),
            matches: vec!["ab12".to_string(), "ab34".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous run id prefix 'ab': matches ab12, ab34"
        );
    }

    #[test]
    fn test_serde_error_maps_to_persistence() {
        let err: DomainError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, DomainError::Persistence(_)));
    }
}
