//! Test execution port - runs one test case against a candidate text.

use async_trait::async_trait;

use crate::domain::models::{CaseExecution, SuiteDefaults, TestCase};

/// Error raised when the executor itself could not run a case.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error("Execution backend unavailable: {0}")]
    Unavailable(String),

    #[error("Execution failed: {0}")]
    Failed(String),
}

/// Trait for test execution capabilities.
///
/// An executor produces an output for `case` under `candidate_text` and
/// judges it against the case's assertions. System problems that still
/// produce a report belong in [`CaseExecution::system_error`]; an `Err` is
/// reserved for the executor being unable to run at all. Both are treated
/// as a per-case error by the evaluator.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    /// Executor name, used in logs and validation reports.
    fn name(&self) -> &str;

    async fn run(
        &self,
        candidate_text: &str,
        case: &TestCase,
        defaults: &SuiteDefaults,
    ) -> Result<CaseExecution, ExecutionError>;
}
