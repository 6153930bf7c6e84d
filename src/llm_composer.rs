//! LLM-written promotional posts
//!
//! The alternate composer asks a language model for one post per page. Any
//! failure (missing credentials, service errors, an empty or overlong answer)
//! is returned as an error so the caller can fall back to
//! [`compose_tweet`](crate::compose_tweet).

use crate::buckets::{build_hashtag_pool, HashtagStrategy};
use crate::compose::{char_len, MAX_LEN, TOOL_CTA};
use crate::{PageMetadata, PromoError};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const SYSTEM_PROMPT: &str = "You are a social media copywriter for technical audiences. \
Write accurate, concise posts without clickbait.";

pub const DEFAULT_TONE: &str = "helpful, confident, concise";

/// The answer expected from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedPost {
    /// The complete post, including the page URL
    pub text: String,
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub prompt: String,
    /// JSON schema of [`GeneratedPost`]
    pub schema: Value,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Recorded as `generated_by` on posts this provider wrote
    fn name(&self) -> &str;

    /// Return either a `{"text": ...}` object or a bare string.
    async fn generate(&self, request: &LlmRequest) -> Result<Value, PromoError>;
}

/// Voice and hashtag preferences for generated posts.
#[derive(Debug, Clone, PartialEq)]
pub struct PostStyle {
    pub tone: String,
    pub brand: Option<String>,
    /// Preferred hashtags; when set they replace the derived pool
    pub hashtags: Vec<String>,
    pub cta: String,
    pub hashtag_strategy: HashtagStrategy,
}

impl Default for PostStyle {
    fn default() -> Self {
        Self {
            tone: DEFAULT_TONE.to_string(),
            brand: None,
            hashtags: Vec::new(),
            cta: TOOL_CTA.to_string(),
            hashtag_strategy: HashtagStrategy::default(),
        }
    }
}

impl PostStyle {
    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    /// An empty brand means no brand line.
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        let brand = brand.into();
        self.brand = (!brand.trim().is_empty()).then_some(brand);
        self
    }

    pub fn with_hashtags(mut self, hashtags: Vec<String>) -> Self {
        self.hashtags = hashtags;
        self
    }

    pub fn with_cta(mut self, cta: impl Into<String>) -> Self {
        self.cta = cta.into();
        self
    }

    pub fn with_hashtag_strategy(mut self, strategy: HashtagStrategy) -> Self {
        self.hashtag_strategy = strategy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 120,
        }
    }
}

impl GenerationConfig {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// User prompt for one page.
pub fn build_user_prompt(meta: &PageMetadata, url: &str, style: &PostStyle) -> String {
    let title = meta.resolved_title().unwrap_or_default();
    let description = meta.resolved_description().unwrap_or_default();
    let keywords = meta.keywords.as_str();

    let pool = build_hashtag_pool(keywords, &style.hashtags, title, style.hashtag_strategy);
    let pool = if pool.is_empty() {
        "(derive from content)".to_string()
    } else {
        pool.join(", ")
    };

    let brand_line = style
        .brand
        .as_deref()
        .map(|brand| format!(" Brand voice: {brand}."))
        .unwrap_or_default();

    format!(
        "Create 1 X/Twitter post (<={MAX_LEN} chars) for this page.\n\
         Constraints:\n\
         - Include this URL: {url}\n\
         - Use at most 1 emoji.\n\
         - Include 2–3 hashtags from this list only: {pool}\n\
         - Clear benefit + a crisp CTA (e.g., '{cta}').\n\
         - Tone: {tone}.{brand_line}\n\
         \n\
         Page data:\n\
         - Title: {title}\n\
         - Description: {description}\n\
         - Keywords: {keywords}\n\
         \n\
         Output: just the tweet text, nothing else.\n",
        cta = style.cta,
        tone = style.tone,
    )
}

/// Pull the post text out of a provider answer.
fn post_text(value: Value) -> Result<String, PromoError> {
    let text = match value {
        Value::String(text) => text,
        other => serde_json::from_value::<GeneratedPost>(other)
            .map_err(|e| PromoError::ParseError(format!("unexpected LLM answer: {e}")))?
            .text,
    };
    Ok(text.trim().to_string())
}

/// Composes posts with an LLM provider.
#[derive(Clone)]
pub struct LlmComposer {
    provider: Arc<dyn LLMProvider>,
    style: PostStyle,
    generation: GenerationConfig,
}

impl LlmComposer {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            style: PostStyle::default(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn with_style(mut self, style: PostStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn style(&self) -> &PostStyle {
        &self.style
    }

    pub fn request_for(&self, meta: &PageMetadata, url: &str) -> Result<LlmRequest, PromoError> {
        let schema = serde_json::to_value(schemars::schema_for!(GeneratedPost))?;
        Ok(LlmRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_user_prompt(meta, url, &self.style),
            schema,
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
        })
    }

    /// Ask the provider for a post and check that it is usable as-is.
    #[instrument(skip(self, meta), fields(provider = %self.provider.name()))]
    pub async fn compose(&self, meta: &PageMetadata, url: &str) -> Result<String, PromoError> {
        let request = self.request_for(meta, url)?;
        let answer = self.provider.generate(&request).await?;
        let text = post_text(answer)?;

        if text.is_empty() {
            return Err(PromoError::ParseError("LLM returned an empty post".into()));
        }
        let length = char_len(&text);
        if length > MAX_LEN {
            warn!(length, "LLM post is too long");
            return Err(PromoError::ParseError(format!(
                "LLM post has {length} characters, limit is {MAX_LEN}"
            )));
        }

        debug!(length, "LLM post accepted");
        Ok(text)
    }
}
