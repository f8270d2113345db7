//! Cross-provider validation.
//!
//! Re-scores a promoted candidate against alternate backends to detect
//! prompts that only work on the model they were optimized for.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::{Candidate, ModelScore, TestSuite, ValidationReport};

use super::evaluator::Evaluator;

const DEFAULT_TARGET_TIMEOUT: Duration = Duration::from_secs(600);

/// One alternate backend to validate against.
#[derive(Clone)]
pub struct ValidationTarget {
    pub name: String,
    pub evaluator: Evaluator,
}

impl ValidationTarget {
    pub fn new(name: impl Into<String>, evaluator: Evaluator) -> Self {
        Self {
            name: name.into(),
            evaluator,
        }
    }
}

/// Runs one task per target concurrently and merges the results once every
/// task has finished.
pub struct CrossProviderValidator {
    targets: Vec<ValidationTarget>,
    target_timeout: Duration,
}

impl CrossProviderValidator {
    pub fn new(targets: Vec<ValidationTarget>) -> Self {
        Self {
            targets,
            target_timeout: DEFAULT_TARGET_TIMEOUT,
        }
    }

    pub fn with_target_timeout(mut self, timeout: Duration) -> Self {
        self.target_timeout = timeout;
        self
    }

    pub fn target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Validator restricted to `names`, in that order. The error lists the
    /// names without a matching target.
    pub fn select(&self, names: &[String]) -> Result<Self, Vec<String>> {
        let mut targets = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.targets.iter().find(|t| &t.name == name) {
                Some(target) => targets.push(target.clone()),
                None => missing.push(name.clone()),
            }
        }

        if missing.is_empty() {
            Ok(Self {
                targets,
                target_timeout: self.target_timeout,
            })
        } else {
            Err(missing)
        }
    }

    /// Score `candidate` on every target. A failing target becomes a
    /// zero-score entry and never affects the others.
    pub async fn validate(
        &self,
        candidate: &Candidate,
        primary_score: f64,
        suite: &TestSuite,
    ) -> ValidationReport {
        let suite = Arc::new(suite.clone());
        let text: Arc<str> = Arc::from(candidate.text.as_str());

        let handles: Vec<_> = self
            .targets
            .iter()
            .map(|target| {
                let name = target.name.clone();
                let evaluator = target.evaluator.clone();
                let suite = Arc::clone(&suite);
                let text = Arc::clone(&text);
                let timeout = self.target_timeout;

                let handle = tokio::spawn(async move {
                    tokio::time::timeout(timeout, evaluator.evaluate(&text, &suite)).await
                });
                (name, handle)
            })
            .collect();

        let mut details = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let score = match handle.await {
                Ok(Ok(result)) if result.is_unusable() => {
                    let error = result
                        .failures
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "every case errored".to_string());
                    ModelScore::failed(&name, error)
                }
                Ok(Ok(result)) => ModelScore {
                    target: name.clone(),
                    score: result.score,
                    passed: result.passed,
                    total: result.total,
                    success: true,
                    error: None,
                    avg_latency_ms: result.avg_latency_ms,
                },
                Ok(Err(_)) => ModelScore::failed(
                    &name,
                    format!("timed out after {}s", self.target_timeout.as_secs()),
                ),
                Err(e) => ModelScore::failed(&name, format!("validation task failed: {e}")),
            };

            if let Some(error) = &score.error {
                tracing::warn!(target_name = %name, error = %error, "validation target failed");
            }
            details.push(score);
        }

        let report = ValidationReport::from_scores(primary_score, details);
        if report.is_overfit() {
            tracing::warn!(
                candidate = %candidate.short_id(),
                targets = ?report.overfit_targets,
                "candidate looks overfit to the primary backend"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CaseExecution, SuiteDefaults, TestCase};
    use crate::domain::ports::{ExecutionError, TestExecutor};
    use async_trait::async_trait;

    struct FixedExecutor {
        pass: bool,
        fail_with: Option<&'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl TestExecutor for FixedExecutor {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn run(
            &self,
            _candidate_text: &str,
            _case: &TestCase,
            _defaults: &SuiteDefaults,
        ) -> Result<CaseExecution, ExecutionError> {
            tokio::time::sleep(self.delay).await;
            if let Some(message) = self.fail_with {
                return Err(ExecutionError::Unavailable(message.to_string()));
            }
            Ok(CaseExecution {
                passed: self.pass,
                ..Default::default()
            })
        }
    }

    fn target(name: &str, pass: bool, fail_with: Option<&'static str>, delay: u64) -> ValidationTarget {
        ValidationTarget::new(
            name,
            Evaluator::new(Arc::new(FixedExecutor {
                pass,
                fail_with,
                delay: Duration::from_secs(delay),
            })),
        )
    }

    fn suite() -> TestSuite {
        TestSuite::new("s", vec![TestCase::new("c1", "x"), TestCase::new("c2", "y")])
    }

    #[tokio::test]
    async fn test_failing_target_does_not_spoil_others() {
        let validator = CrossProviderValidator::new(vec![
            target("good", true, None, 0),
            target("broken", true, Some("connection refused"), 0),
            target("weak", false, None, 0),
        ]);
        let candidate = Candidate::baseline("prompt");

        let report = validator.validate(&candidate, 1.0, &suite()).await;

        assert_eq!(report.details.len(), 3);
        assert!((report.scores["good"] - 1.0).abs() < f64::EPSILON);
        assert!(report.scores["weak"].abs() < f64::EPSILON);
        let broken = &report.details[1];
        assert!(!broken.success);
        assert!(broken.error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(report.overfit_targets, vec!["broken".to_string(), "weak".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_target_times_out() {
        let validator = CrossProviderValidator::new(vec![
            target("slow", true, None, 30),
            target("fast", true, None, 0),
        ])
        .with_target_timeout(Duration::from_secs(5));
        let candidate = Candidate::baseline("prompt");

        let report = validator.validate(&candidate, 1.0, &suite()).await;

        assert!(!report.details[0].success);
        assert!(report.details[0].error.as_deref().unwrap().contains("timed out"));
        assert!(report.details[1].success);
    }

    #[test]
    fn test_select_reports_missing_targets() {
        let validator = CrossProviderValidator::new(vec![
            target("a", true, None, 0),
            target("b", true, None, 0),
        ]);
        let selected = validator.select(&["b".to_string()]).unwrap();
        assert_eq!(selected.target_names(), vec!["b".to_string()]);

        let missing = validator
            .select(&["a".to_string(), "zzz".to_string()])
            .err()
            .unwrap();
        assert_eq!(missing, vec!["zzz".to_string()]);
    }

    #[tokio::test]
    async fn test_no_targets_yields_empty_report() {
        let validator = CrossProviderValidator::new(vec![]);
        let report = validator
            .validate(&Candidate::baseline("p"), 0.5, &suite())
            .await;
        assert!(report.details.is_empty());
        assert!(!report.is_overfit());
    }
}
