//! LLM configuration and validation utilities

use crate::llm_composer::LLMProvider;
use crate::llm_providers::anthropic::{AnthropicProvider, DEFAULT_ANTHROPIC_MODEL};
use crate::llm_providers::openai::{OpenAIProvider, DEFAULT_OPENAI_MODEL};
use crate::PromoError;
use std::sync::Arc;
use tracing::{debug, warn};

/// API key validation utilities
pub struct ApiKeyValidator;

impl ApiKeyValidator {
    pub fn validate_openai_key(api_key: &str) -> Result<(), PromoError> {
        if api_key.is_empty() {
            return Err(PromoError::InvalidConfiguration(
                "OpenAI API key cannot be empty".to_string(),
            ));
        }

        if !api_key.starts_with("sk-") {
            return Err(PromoError::InvalidConfiguration(
                "OpenAI API key must start with 'sk-'".to_string(),
            ));
        }

        if api_key.len() < 20 {
            return Err(PromoError::InvalidConfiguration(
                "OpenAI API key appears to be too short".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_anthropic_key(api_key: &str) -> Result<(), PromoError> {
        if api_key.is_empty() {
            return Err(PromoError::InvalidConfiguration(
                "Anthropic API key cannot be empty".to_string(),
            ));
        }

        if !api_key.starts_with("sk-ant-") {
            return Err(PromoError::InvalidConfiguration(
                "Anthropic API key must start with 'sk-ant-'".to_string(),
            ));
        }

        if api_key.len() < 20 {
            return Err(PromoError::InvalidConfiguration(
                "Anthropic API key appears to be too short".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether `model` belongs to a family this provider is known to serve.
    /// Providers other than OpenAI and Anthropic are not checked.
    pub fn is_known_model(provider: &str, model: &str) -> bool {
        let known: &[&str] = match provider.to_lowercase().as_str() {
            "openai" => &["gpt-", "chatgpt-", "o1", "o3", "o4"],
            "anthropic" => &["claude-"],
            _ => return true,
        };
        known.iter().any(|prefix| model.starts_with(prefix))
    }

    /// Unknown models are passed through; gateways serve their own names.
    fn check_model(provider: &str, model: &str) {
        if !Self::is_known_model(provider, model) {
            warn!(provider, model, "Unrecognized model name, using it as given");
        }
    }
}

/// Which provider writes the posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Anthropic,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(format!("unknown LLM provider: {other}")),
        }
    }
}

/// Configuration helper for LLM providers
pub struct LLMConfig;

impl LLMConfig {
    /// OpenAI provider from `OPENAI_API_KEY`; the model comes from `model`,
    /// then `OPENAI_MODEL`, then the default.
    pub fn openai_from_env(model: Option<String>) -> Result<OpenAIProvider, PromoError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            PromoError::InvalidConfiguration("OPENAI_API_KEY environment variable not set".into())
        })?;
        ApiKeyValidator::validate_openai_key(&api_key)?;

        let model = model
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        ApiKeyValidator::check_model("openai", &model);

        debug!(model = %model, "Using OpenAI provider");
        Ok(OpenAIProvider::new(api_key).with_model(model))
    }

    /// Anthropic provider from `ANTHROPIC_API_KEY` and `ANTHROPIC_MODEL`.
    pub fn anthropic_from_env(model: Option<String>) -> Result<AnthropicProvider, PromoError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            PromoError::InvalidConfiguration(
                "ANTHROPIC_API_KEY environment variable not set".into(),
            )
        })?;
        ApiKeyValidator::validate_anthropic_key(&api_key)?;

        let model = model
            .or_else(|| std::env::var("ANTHROPIC_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
        ApiKeyValidator::check_model("anthropic", &model);

        debug!(model = %model, "Using Anthropic provider");
        Ok(AnthropicProvider::new(api_key).with_model(model))
    }

    pub fn provider_from_env(
        kind: ProviderKind,
        model: Option<String>,
    ) -> Result<Arc<dyn LLMProvider>, PromoError> {
        Ok(match kind {
            ProviderKind::OpenAI => Arc::new(Self::openai_from_env(model)?),
            ProviderKind::Anthropic => Arc::new(Self::anthropic_from_env(model)?),
        })
    }
}
