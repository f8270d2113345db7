//! Test execution through a generation backend.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::models::{CaseExecution, SuiteDefaults, TestCase};
use crate::domain::ports::{ExecutionError, GenerationParams, GenerationService, TestExecutor};

/// Runs a case by sending the candidate as the system instruction and the
/// case input as the user prompt, then checking the case's assertions.
pub struct LlmTestExecutor {
    name: String,
    service: Arc<dyn GenerationService>,
}

impl LlmTestExecutor {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            name: service.model_id().to_string(),
            service,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// System instruction for a case: the suite prefix, then the candidate.
fn system_instruction(candidate_text: &str, defaults: &SuiteDefaults) -> String {
    match defaults.system_prefix.as_deref().map(str::trim) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}\n\n{candidate_text}"),
        _ => candidate_text.to_string(),
    }
}

#[async_trait]
impl TestExecutor for LlmTestExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        candidate_text: &str,
        case: &TestCase,
        defaults: &SuiteDefaults,
    ) -> Result<CaseExecution, ExecutionError> {
        let system = system_instruction(candidate_text, defaults);
        let params = GenerationParams {
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        };

        let started = Instant::now();
        match self
            .service
            .generate_with(&case.input, Some(&system), params)
            .await
        {
            Ok(generation) => {
                let failure_reasons = case.failure_reasons(&generation.text);
                Ok(CaseExecution {
                    passed: failure_reasons.is_empty(),
                    failure_reasons,
                    output: generation.text,
                    duration: generation.latency,
                    system_error: None,
                })
            }
            Err(e) => Ok(CaseExecution::system_error(e.to_string(), started.elapsed())),
        }
    }
}
