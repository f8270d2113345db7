//! Generation backend registry and factory.
//!
//! Backends are named `provider:model` (`anthropic:claude-sonnet-4-5`,
//! `openai:gpt-4o-mini`) or just `mock`.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::GenerationConfig;
use crate::domain::ports::GenerationService;

use super::anthropic_api::{AnthropicConfig, AnthropicGenerationService};
use super::mock::MockGenerationService;
use super::openai_compat::{OpenAiCompatConfig, OpenAiCompatGenerationService};

/// Supported providers.
pub const PROVIDERS: [&str; 3] = ["anthropic", "openai", "mock"];

/// Builds generation backends from identifiers.
pub struct GenerationRegistry {
    config: GenerationConfig,
}

impl GenerationRegistry {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    /// Identifier of the configured default provider for `model`.
    pub fn default_identifier(&self, model: &str) -> String {
        if self.config.provider == "mock" {
            "mock".to_string()
        } else {
            format!("{}:{model}", self.config.provider)
        }
    }

    /// Create the default provider's backend for `model`.
    pub fn primary(&self, model: &str) -> DomainResult<Arc<dyn GenerationService>> {
        self.create(&self.default_identifier(model))
    }

    /// Create a backend from a `provider:model` identifier.
    ///
    /// `base_url` and `api_key` overrides apply only to the configured
    /// default provider.
    pub fn create(&self, identifier: &str) -> DomainResult<Arc<dyn GenerationService>> {
        let (provider, model) = parse_identifier(identifier)?;
        let overrides = provider == self.config.provider;

        match provider {
            "anthropic" => {
                let mut config = AnthropicConfig {
                    max_tokens: self.config.max_tokens,
                    ..AnthropicConfig::default()
                }
                .with_model(model);
                if overrides {
                    if let Some(url) = &self.config.base_url {
                        config = config.with_base_url(url.clone());
                    }
                    config.api_key.clone_from(&self.config.api_key);
                }
                Ok(Arc::new(AnthropicGenerationService::new(config)?))
            }
            "openai" => {
                let mut config = OpenAiCompatConfig {
                    max_tokens: self.config.max_tokens,
                    ..OpenAiCompatConfig::default()
                }
                .with_model(model);
                if overrides {
                    if let Some(url) = &self.config.base_url {
                        config = config.with_base_url(url.clone());
                    }
                    config.api_key.clone_from(&self.config.api_key);
                }
                Ok(Arc::new(OpenAiCompatGenerationService::new(config)?))
            }
            "mock" => Ok(Arc::new(MockGenerationService::default().with_model(model))),
            other => Err(DomainError::Configuration(format!(
                "unknown generation provider '{other}' (available: {})",
                PROVIDERS.join(", ")
            ))),
        }
    }
}

impl Default for GenerationRegistry {
    fn default() -> Self {
        Self::new(GenerationConfig::default())
    }
}

/// Split `provider:model`. A bare `mock` is accepted.
pub fn parse_identifier(identifier: &str) -> DomainResult<(&str, &str)> {
    if identifier == "mock" {
        return Ok(("mock", "mock"));
    }

    match identifier.split_once(':') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok((provider, model))
        }
        _ => Err(DomainError::Configuration(format!(
            "invalid backend identifier '{identifier}': expected provider:model"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifier() {
        assert_eq!(
            parse_identifier("openai:gpt-4o-mini").unwrap(),
            ("openai", "gpt-4o-mini")
        );
        assert_eq!(parse_identifier("mock").unwrap(), ("mock", "mock"));
        assert!(parse_identifier("gpt-4o").is_err());
        assert!(parse_identifier("openai:").is_err());
    }

    #[test]
    fn test_create_known_providers() {
        let registry = GenerationRegistry::default();
        let anthropic = registry.create("anthropic:claude-haiku-4-5").unwrap();
        assert_eq!(anthropic.model_id(), "claude-haiku-4-5");

        let openai = registry.create("openai:gpt-4o").unwrap();
        assert_eq!(openai.model_id(), "gpt-4o");

        assert_eq!(registry.create("mock").unwrap().model_id(), "mock");
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let registry = GenerationRegistry::default();
        assert!(matches!(
            registry.create("cohere:command"),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn test_default_identifier_follows_provider() {
        let registry = GenerationRegistry::new(GenerationConfig {
            provider: "openai".to_string(),
            ..GenerationConfig::default()
        });
        assert_eq!(registry.default_identifier("gpt-4o"), "openai:gpt-4o");

        let mock = GenerationRegistry::new(GenerationConfig {
            provider: "mock".to_string(),
            ..GenerationConfig::default()
        });
        assert_eq!(mock.default_identifier("anything"), "mock");
        assert_eq!(mock.primary("anything").unwrap().model_id(), "mock");
        assert_eq!(
            registry.primary("gpt-4o-mini").unwrap().model_id(),
            "gpt-4o-mini"
        );
    }
}
