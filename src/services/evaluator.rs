//! Scores a candidate text by running a test suite against it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::models::{EvaluationResult, TestSuite};
use crate::domain::ports::TestExecutor;

const DEFAULT_CASE_TIMEOUT: Duration = Duration::from_secs(90);

/// Runs every case of a suite through a [`TestExecutor`] and aggregates the
/// outcome.
///
/// Cases run sequentially in suite order. Executor errors and timeouts are
/// scored as per-case errors; nothing is retried here.
#[derive(Clone)]
pub struct Evaluator {
    executor: Arc<dyn TestExecutor>,
    case_timeout: Duration,
}

impl Evaluator {
    pub fn new(executor: Arc<dyn TestExecutor>) -> Self {
        Self {
            executor,
            case_timeout: DEFAULT_CASE_TIMEOUT,
        }
    }

    pub fn with_case_timeout(mut self, timeout: Duration) -> Self {
        self.case_timeout = timeout;
        self
    }

    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }

    pub async fn evaluate(&self, candidate_text: &str, suite: &TestSuite) -> EvaluationResult {
        let mut passed = 0u32;
        let mut errors = 0u32;
        let mut total_latency = Duration::ZERO;
        let mut failures = Vec::new();

        for case in &suite.cases {
            let started = Instant::now();
            let outcome = tokio::time::timeout(
                self.case_timeout,
                self.executor.run(candidate_text, case, &suite.defaults),
            )
            .await;

            match outcome {
                Ok(Ok(execution)) => {
                    total_latency += execution.duration;
                    if let Some(error) = execution.system_error {
                        errors += 1;
                        failures.push(format!("[{}] Error: {error}", case.id));
                    } else if execution.passed {
                        passed += 1;
                    } else {
                        let reasons = if execution.failure_reasons.is_empty() {
                            "output did not satisfy the case".to_string()
                        } else {
                            execution.failure_reasons.join(", ")
                        };
                        failures.push(format!("[{}] Failed: {reasons}", case.id));
                    }
                }
                Ok(Err(e)) => {
                    total_latency += started.elapsed();
                    errors += 1;
                    failures.push(format!("[{}] Error: {e}", case.id));
                }
                Err(_) => {
                    total_latency += self.case_timeout;
                    errors += 1;
                    failures.push(format!(
                        "[{}] Error: timed out after {}s",
                        case.id,
                        self.case_timeout.as_secs()
                    ));
                }
            }
        }

        let total = u32::try_from(suite.cases.len()).unwrap_or(u32::MAX);
        let avg_latency_ms = if total == 0 {
            0.0
        } else {
            total_latency.as_secs_f64() * 1000.0 / f64::from(total)
        };

        let result = EvaluationResult::from_counts(total, passed, errors, avg_latency_ms, failures);
        tracing::debug!(
            executor = self.executor.name(),
            suite = %suite.name,
            score = result.score,
            passed = result.passed,
            errors = result.errors,
            "evaluated candidate"
        );
        result
    }
}
