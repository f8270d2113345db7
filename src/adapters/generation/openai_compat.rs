//! OpenAI-compatible chat completions backend.
//!
//! Works against api.openai.com and any server exposing the same
//! `/v1/chat/completions` shape (vLLM, Ollama, LM Studio, ...).

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::anthropic_api::{status_error, transport_error};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    Generation, GenerationError, GenerationParams, GenerationService, TokenUsage,
};

#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// API key (read from OPENAI_API_KEY when not set). Local servers may
    /// need none.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
            max_tokens: 2048,
            temperature: None,
        }
    }
}

impl OpenAiCompatConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub struct OpenAiCompatGenerationService {
    config: OpenAiCompatConfig,
    client: Client,
}

impl OpenAiCompatGenerationService {
    pub fn new(config: OpenAiCompatConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DomainError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    fn build_request<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
        params: GenerationParams,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: params.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: params.temperature.or(self.config.temperature),
        }
    }
}

#[async_trait]
impl GenerationService for OpenAiCompatGenerationService {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn generate_with(
        &self,
        prompt: &str,
        system: Option<&str>,
        params: GenerationParams,
    ) -> Result<Generation, GenerationError> {
        let started = Instant::now();
        let mut request = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&self.build_request(prompt, system, params));
        if let Some(key) = self.config.get_api_key() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&e, Duration::from_secs(self.config.timeout_secs)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("no choices in response".to_string()))?;

        let usage = result.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        Ok(Generation {
            text,
            usage,
            latency: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_becomes_first_message() {
        let service =
            OpenAiCompatGenerationService::new(OpenAiCompatConfig::default()).unwrap();
        let json = serde_json::to_value(service.build_request(
            "hello",
            Some("be brief"),
            GenerationParams::default(),
        ))
        .unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn test_parses_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "Recursion is..."}}],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 4}}"#,
            )
            .create_async()
            .await;

        let config = OpenAiCompatConfig {
            api_key: Some("test-key".to_string()),
            ..OpenAiCompatConfig::default()
        }
        .with_base_url(server.url());
        let service = OpenAiCompatGenerationService::new(config).unwrap();

        let generation = service.generate("Explain recursion", None).await.unwrap();
        assert_eq!(generation.text, "Recursion is...");
        assert_eq!(generation.usage.input_tokens, 12);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let service = OpenAiCompatGenerationService::new(
            OpenAiCompatConfig {
                api_key: Some("k".to_string()),
                ..OpenAiCompatConfig::default()
            }
            .with_base_url(server.url()),
        )
        .unwrap();

        assert!(matches!(
            service.generate("p", None).await,
            Err(GenerationError::InvalidResponse(_))
        ));
    }
}
