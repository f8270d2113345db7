//! Generation Service Port
//!
//! Abstraction over the text generation backends the engine talks to:
//! - Anthropic Messages API
//! - OpenAI-compatible chat completion endpoints (hosted or local)
//! - Scripted mock backends for tests and offline runs
//!
//! Mutation strategies, the adversarial probe generator and the LLM test
//! executor all go through this trait, so any backend can play any role.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result of one generation call
#[derive(Debug, Clone)]
pub struct Generation {
    /// Generated text
    pub text: String,

    /// Token usage reported by the backend (zero when unknown)
    pub usage: TokenUsage,

    /// Wall-clock latency of the call
    pub latency: Duration,
}

/// Per-call sampling overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Error types for generation calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Generation timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

/// Port trait for text generation backends
///
/// Implementations must be `Send + Sync`: cross-provider validation calls
/// several backends from concurrently running tokio tasks.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Identifier of the model this backend generates with, used for pricing.
    fn model_id(&self) -> &str;

    /// Generate a completion for `prompt` under an optional system instruction.
    async fn generate_with(
        &self,
        prompt: &str,
        system: Option<&str>,
        params: GenerationParams,
    ) -> Result<Generation, GenerationError>;

    /// Generate with the backend's default sampling parameters.
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<Generation, GenerationError> {
        self.generate_with(prompt, system, GenerationParams::default())
            .await
    }
}

/// Run a generation call under a hard deadline.
///
/// When the deadline fires the pending call is dropped, which cancels an
/// in-flight HTTP request.
pub async fn generate_within(
    service: &dyn GenerationService,
    prompt: &str,
    system: Option<&str>,
    deadline: Duration,
) -> Result<Generation, GenerationError> {
    match tokio::time::timeout(deadline, service.generate(prompt, system)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout(deadline)),
    }
}
