//! Promotional post generator for the pages of a sitemap.
//!
//! Picks URLs from a sitemap, captures a screenshot and the metadata of each
//! page, writes a short post under 280 characters, and optionally publishes
//! it to X. Results land in `posts.json`, `posts.csv` and `posts.md`.

mod attempts;
mod buckets;
mod capture;
mod compose;
mod error;
mod fetcher;
mod metadata;
mod output;
mod pipeline;
mod publisher;
mod security;
mod sitemap;
mod utils;

#[cfg(feature = "logging")]
mod logging;

#[cfg(feature = "browser")]
pub mod mcp_client;

#[cfg(feature = "llm")]
mod llm_composer;
#[cfg(feature = "llm")]
mod llm_config;
#[cfg(feature = "llm")]
pub mod llm_providers;

pub use attempts::{first_success, is_retryable_publish_failure, is_timeout};
pub use buckets::{build_hashtag_pool, choose_buckets, Bucket, HashtagStrategy, MAX_POOL_SIZE};
pub use capture::{
    CaptureOptions, HttpCapture, PageCapture, WaitUntil, AD_HOST_PATTERNS, DEFAULT_VIEWPORT,
};
pub use compose::{
    call_to_action, canonical_hashtag, char_len, compose_tweet, derive_hashtags, fit_to_length,
    is_stopword, DEFAULT_CTA, FALLBACK_TITLE, LEAD_MARKER, MAX_HASHTAGS, MAX_LEN, TOOL_CTA,
};
pub use error::PromoError;
pub use fetcher::{Fetcher, FetcherConfig};
pub use metadata::{MetadataExtractor, PageMetadata};
pub use output::{
    render_csv, render_json, render_markdown, write_outputs, OutputPaths, PostRecord, CSV_FILE,
    JSON_FILE, LOCAL_GENERATOR, MARKDOWN_FILE,
};
pub use pipeline::{PromoPipeline, RunConfig, RunEvent, RunSummary};
pub use publisher::{
    alt_text_for, PostRequest, PublishedPost, Publisher, MAX_ALT_TEXT_CHARS,
};
pub use security::{UrlValidationConfig, UrlValidator};
pub use sitemap::{
    exclude_urls, fetch_sitemap, parse_patterns, parse_sitemap, read_sitemap, sample_urls,
    SitemapSource,
};
pub use utils::{sanitize_filename, truncate_chars, truncate_str};

#[cfg(feature = "logging")]
pub use logging::{log_error_card, log_post_card, setup_logging, LogConfig, LOG_FILE_NAME};

#[cfg(feature = "browser")]
pub use capture::BrowserCapture;
#[cfg(feature = "browser")]
pub use mcp_client::{McpClient, McpConfig};

#[cfg(feature = "twitter")]
pub use publisher::{posting_enabled, XCredentials, XEndpoints, XPublisher};

#[cfg(feature = "llm")]
pub use llm_composer::{
    build_user_prompt, GeneratedPost, GenerationConfig, LLMProvider, LlmComposer, LlmRequest,
    PostStyle, DEFAULT_TONE, SYSTEM_PROMPT,
};
#[cfg(feature = "llm")]
pub use llm_config::{ApiKeyValidator, LLMConfig, ProviderKind};
#[cfg(feature = "llm")]
pub use llm_providers::MockProvider;
