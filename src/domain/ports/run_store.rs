//! Run store port - durable storage for optimization runs.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{OptimizationRun, RunSummary};

/// Persistence for [`OptimizationRun`] documents.
///
/// Every save overwrites the full document for the run id, so saving the
/// same run twice is idempotent.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist the complete current state of `run`.
    async fn save(&self, run: &OptimizationRun) -> DomainResult<()>;

    /// Load a run by its full id.
    async fn load(&self, id: &str) -> DomainResult<OptimizationRun>;

    /// Load a run by a unique id prefix. Ambiguous prefixes are rejected.
    async fn load_by_prefix(&self, prefix: &str) -> DomainResult<OptimizationRun>;

    /// Summaries of every stored run, most recently updated first.
    async fn list(&self) -> DomainResult<Vec<RunSummary>>;
}

/// Reject empty or non-hex id prefixes before querying.
pub fn validate_prefix(prefix: &str) -> DomainResult<()> {
    use crate::domain::errors::DomainError;

    if prefix.is_empty() {
        return Err(DomainError::RunNotFound(
            "run id prefix must not be empty".to_string(),
        ));
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        return Err(DomainError::RunNotFound(format!(
            "invalid run id prefix '{prefix}': must contain only hex characters and dashes"
        )));
    }
    Ok(())
}
