//! Anthropic Messages API generation backend.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    Generation, GenerationError, GenerationParams, GenerationService, TokenUsage,
};

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (read from ANTHROPIC_API_KEY when not set).
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub api_version: String,
    /// HTTP request timeout. Callers still apply their own deadline on top.
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            api_version: "2023-06-01".to_string(),
            timeout_secs: 120,
            max_tokens: 2048,
            temperature: None,
        }
    }
}

impl AnthropicConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
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
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Content block in a response. Only text blocks carry generated text.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

/// Generation backend over the Anthropic Messages API.
pub struct AnthropicGenerationService {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicGenerationService {
    pub fn new(config: AnthropicConfig) -> DomainResult<Self> {
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
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.config.model,
            max_tokens: params.max_tokens.unwrap_or(self.config.max_tokens),
            system: system.filter(|s| !s.is_empty()),
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature.or(self.config.temperature),
        }
    }
}

/// Map an HTTP failure status to a generation error.
pub(super) fn status_error(status: StatusCode, body: String) -> GenerationError {
    let message = format!("{status}: {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited(message),
        s if s.is_server_error() => GenerationError::Unavailable(message),
        _ => GenerationError::Http(message),
    }
}

/// Map a transport failure to a generation error.
pub(super) fn transport_error(err: &reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout)
    } else if err.is_connect() {
        GenerationError::Unavailable(err.to_string())
    } else {
        GenerationError::Http(err.to_string())
    }
}

#[async_trait]
impl GenerationService for AnthropicGenerationService {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn generate_with(
        &self,
        prompt: &str,
        system: Option<&str>,
        params: GenerationParams,
    ) -> Result<Generation, GenerationError> {
        let api_key = self
            .config
            .get_api_key()
            .ok_or_else(|| GenerationError::NotConfigured("ANTHROPIC_API_KEY not set".to_string()))?;

        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&self.build_request(prompt, system, params))
            .send()
            .await
            .map_err(|e| transport_error(&e, Duration::from_secs(self.config.timeout_secs)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text = result
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Generation {
            text,
            usage: TokenUsage {
                input_tokens: result.usage.input_tokens,
                output_tokens: result.usage.output_tokens,
            },
            latency: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_empty_system() {
        let service = AnthropicGenerationService::new(AnthropicConfig::default()).unwrap();
        let request = service.build_request("hi", Some(""), GenerationParams::default());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 2048);
    }

    #[test]
    fn test_params_override_defaults() {
        let service = AnthropicGenerationService::new(AnthropicConfig::default()).unwrap();
        let params = GenerationParams {
            max_tokens: Some(64),
            temperature: Some(0.0),
        };
        let json = serde_json::to_value(service.build_request("hi", Some("sys"), params)).unwrap();
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["system"], "sys");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            GenerationError::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            GenerationError::Auth(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            GenerationError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, String::new()),
            GenerationError::Http(_)
        ));
    }
}
