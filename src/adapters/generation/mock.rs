//! Mock generation backend for tests and offline runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::ports::{
    Generation, GenerationError, GenerationParams, GenerationService, TokenUsage,
};
use crate::services::cost_tracker::estimate_tokens;

type ResponderFn = dyn Fn(&str, Option<&str>) -> Result<String, GenerationError> + Send + Sync;

/// How the mock answers.
#[derive(Clone)]
enum MockBehavior {
    /// Same text for every call.
    Fixed(String),
    /// Responses in order; the last one repeats once the queue is drained.
    Queue(Arc<Mutex<VecDeque<String>>>, String),
    /// Computed from the prompt and system instruction.
    Responder(Arc<ResponderFn>),
    /// Every call fails.
    Failing(GenerationError),
}

/// A recorded call, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    pub system: Option<String>,
}

/// Scripted [`GenerationService`].
///
/// Reports token usage estimated from text length so cost accounting behaves
/// the same as with a real backend.
#[derive(Clone)]
pub struct MockGenerationService {
    model: String,
    behavior: MockBehavior,
    delay: Duration,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockGenerationService {
    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            model: "mock".to_string(),
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fixed(text.into()))
    }

    pub fn queue<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        let responses: VecDeque<String> = responses.into_iter().map(Into::into).collect();
        let last = responses.back().cloned().unwrap_or_default();
        Self::with_behavior(MockBehavior::Queue(Arc::new(Mutex::new(responses)), last))
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self::with_behavior(MockBehavior::Responder(Arc::new(responder)))
    }

    pub fn failing(error: GenerationError) -> Self {
        Self::with_behavior(MockBehavior::Failing(error))
    }

    /// Report a different model id (affects pricing).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Calls received so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn respond(&self, prompt: &str, system: Option<&str>) -> Result<String, GenerationError> {
        match &self.behavior {
            MockBehavior::Fixed(text) => Ok(text.clone()),
            MockBehavior::Queue(queue, last) => {
                Ok(queue.lock().await.pop_front().unwrap_or_else(|| last.clone()))
            }
            MockBehavior::Responder(responder) => responder(prompt, system),
            MockBehavior::Failing(error) => Err(error.clone()),
        }
    }
}

impl Default for MockGenerationService {
    fn default() -> Self {
        Self::fixed("Mock response.")
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate_with(
        &self,
        prompt: &str,
        system: Option<&str>,
        _params: GenerationParams,
    ) -> Result<Generation, GenerationError> {
        let started = Instant::now();
        self.calls.lock().await.push(RecordedCall {
            prompt: prompt.to_string(),
            system: system.map(str::to_string),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let text = self.respond(prompt, system).await?;
        let input_tokens = estimate_tokens(prompt) + system.map_or(0, estimate_tokens);
        Ok(Generation {
            usage: TokenUsage {
                input_tokens,
                output_tokens: estimate_tokens(&text),
            },
            text,
            latency: started.elapsed(),
        })
    }
}
