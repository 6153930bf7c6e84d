//! Run orchestration: sitemap to artifacts.
//!
//! A run loads the sitemap, filters and samples its URLs, then processes the
//! picks one at a time: screenshot, metadata, post text, optional publishing.
//! Only sitemap problems and artifact writes end a run early; every per-page
//! failure is logged and the page is still recorded.

use crate::capture::PageCapture;
use crate::output::{write_outputs, OutputPaths, PostRecord, LOCAL_GENERATOR};
use crate::publisher::{alt_text_for, PostRequest, Publisher};
use crate::security::{UrlValidationConfig, UrlValidator};
use crate::sitemap::{exclude_urls, sample_urls, SitemapSource};
use crate::{compose_tweet, Fetcher, PageMetadata, PromoError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "llm")]
use crate::llm_composer::LlmComposer;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sitemap: SitemapSource,
    /// How many URLs to pick
    pub count: usize,
    pub out_dir: PathBuf,
    /// Case-insensitive substrings; matching URLs are skipped
    pub exclude_patterns: Vec<String>,
    /// Fixes the random pick when set
    pub seed: Option<u64>,
    pub validation: UrlValidationConfig,
    pub attach_alt_text: bool,
    /// Pause after each published post
    pub publish_delay: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sitemap: SitemapSource::File(PathBuf::from("sitemap.xml")),
            count: 2,
            out_dir: PathBuf::from("outputs"),
            exclude_patterns: vec!["/docs/".to_string()],
            seed: None,
            validation: UrlValidationConfig::default(),
            attach_alt_text: true,
            publish_delay: Duration::from_secs(2),
        }
    }
}

impl RunConfig {
    pub fn with_sitemap(mut self, sitemap: SitemapSource) -> Self {
        self.sitemap = sitemap;
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_validation(mut self, validation: UrlValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_alt_text(mut self, attach_alt_text: bool) -> Self {
        self.attach_alt_text = attach_alt_text;
        self
    }

    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = delay;
        self
    }
}

/// Progress notifications emitted while a run is underway.
#[derive(Debug)]
pub enum RunEvent<'a> {
    /// URLs picked for this run
    Selected(usize),
    Started(&'a str),
    /// A step failed for this URL; the run carries on
    Failed {
        url: &'a str,
        error: &'a PromoError,
    },
    Finished(&'a PostRecord),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: Vec<PostRecord>,
    pub outputs: OutputPaths,
}

impl RunSummary {
    pub fn published(&self) -> usize {
        self.records.iter().filter(|r| r.is_published()).count()
    }

    pub fn with_screenshots(&self) -> usize {
        self.records.iter().filter(|r| !r.image.is_empty()).count()
    }
}

pub struct PromoPipeline {
    config: RunConfig,
    fetcher: Fetcher,
    validator: UrlValidator,
    capture: Arc<dyn PageCapture>,
    #[cfg(feature = "llm")]
    llm: Option<LlmComposer>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl PromoPipeline {
    pub fn new(config: RunConfig, capture: Arc<dyn PageCapture>) -> Self {
        let validator = UrlValidator::new(config.validation.clone());
        Self {
            config,
            fetcher: Fetcher::new(),
            validator,
            capture,
            #[cfg(feature = "llm")]
            llm: None,
            publisher: None,
        }
    }

    /// Fetcher used for remote sitemaps.
    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[cfg(feature = "llm")]
    pub fn with_llm(mut self, composer: LlmComposer) -> Self {
        self.llm = Some(composer);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Load the sitemap and pick this run's URLs.
    #[instrument(skip(self), fields(sitemap = %self.config.sitemap))]
    pub async fn select_urls(&self) -> Result<Vec<String>, PromoError> {
        let urls = self.config.sitemap.load(&self.fetcher).await?;
        if urls.is_empty() {
            return Err(PromoError::NoUrls);
        }
        let loaded = urls.len();

        let urls = exclude_urls(urls, &self.config.exclude_patterns);
        if urls.is_empty() {
            return Err(PromoError::AllUrlsExcluded);
        }
        let remaining = urls.len();

        let urls = self.validator.retain_valid(urls);
        if urls.is_empty() {
            return Err(PromoError::AllUrlsRejected(remaining));
        }

        let picked = sample_urls(&urls, self.config.count, self.config.seed);
        info!(
            loaded,
            eligible = urls.len(),
            picked = picked.len(),
            "Selected URLs"
        );
        Ok(picked)
    }

    pub async fn run(&self) -> Result<RunSummary, PromoError> {
        self.run_with_progress(|_| {}).await
    }

    pub async fn run_with_progress<F>(&self, mut on_event: F) -> Result<RunSummary, PromoError>
    where
        F: FnMut(RunEvent<'_>),
    {
        let urls = self.select_urls().await?;
        on_event(RunEvent::Selected(urls.len()));

        let mut records = Vec::with_capacity(urls.len());
        for url in &urls {
            on_event(RunEvent::Started(url));
            let record = self.process_url_reporting(url, &mut on_event).await;
            on_event(RunEvent::Finished(&record));
            records.push(record);
        }

        if let Err(e) = self.capture.shutdown().await {
            warn!(error = %e, "Capture shutdown failed");
        }

        let outputs = write_outputs(&self.config.out_dir, &records)?;
        Ok(RunSummary { records, outputs })
    }

    /// Produce the record for one page. Never fails; missing pieces stay empty.
    pub async fn process_url(&self, url: &str) -> PostRecord {
        self.process_url_reporting(url, &mut |_: RunEvent<'_>| {}).await
    }

    #[instrument(skip(self, on_event))]
    async fn process_url_reporting<F>(&self, url: &str, on_event: &mut F) -> PostRecord
    where
        F: FnMut(RunEvent<'_>),
    {
        let image = match self.capture.screenshot(url, &self.config.out_dir).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(url = %url, error = %e, "Screenshot failed");
                on_event(RunEvent::Failed { url, error: &e });
                None
            }
        };

        let meta = match self.capture.metadata(url).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(url = %url, error = %e, "Metadata extraction failed");
                on_event(RunEvent::Failed { url, error: &e });
                PageMetadata::default()
            }
        };

        let (tweet, generated_by) = self.write_post(&meta, url).await;
        let mut record = PostRecord::new(url, tweet, meta)
            .with_image(image.as_deref())
            .with_generator(generated_by);

        if let Some(publisher) = &self.publisher {
            if let Err(e) = self
                .publish(publisher.as_ref(), &mut record, image.as_deref())
                .await
            {
                on_event(RunEvent::Failed { url, error: &e });
            }
        }

        record
    }

    async fn write_post(&self, meta: &PageMetadata, url: &str) -> (String, String) {
        match self.llm_post(meta, url).await {
            Some(post) => post,
            None => (compose_tweet(meta, url), LOCAL_GENERATOR.to_string()),
        }
    }

    #[cfg(feature = "llm")]
    async fn llm_post(&self, meta: &PageMetadata, url: &str) -> Option<(String, String)> {
        let llm = self.llm.as_ref()?;
        match llm.compose(meta, url).await {
            Ok(text) => Some((text, llm.provider_name().to_string())),
            Err(e) => {
                warn!(url = %url, error = %e, "LLM generation failed, using local composer");
                None
            }
        }
    }

    #[cfg(not(feature = "llm"))]
    async fn llm_post(&self, _meta: &PageMetadata, _url: &str) -> Option<(String, String)> {
        None
    }

    async fn publish(
        &self,
        publisher: &dyn Publisher,
        record: &mut PostRecord,
        image: Option<&Path>,
    ) -> Result<(), PromoError> {
        let alt_text = if self.config.attach_alt_text {
            alt_text_for(&record.meta)
        } else {
            None
        };

        let mut post = PostRequest::text(record.tweet.clone()).with_alt_text(alt_text);
        if let Some(path) = image.filter(|p| p.is_file()) {
            post = post.with_image(path.to_path_buf());
        }

        match publisher.publish(&post).await {
            Ok(published) => {
                debug!(url = %record.url, id = %published.id, "Published");
                record.x_tweet_id = Some(published.id);
                record.x_url = published.url;
                if !self.config.publish_delay.is_zero() {
                    tokio::time::sleep(self.config.publish_delay).await;
                }
                Ok(())
            }
            Err(e) => {
                match &e {
                    PromoError::AuthError(_) => e.log(),
                    _ => warn!(
                        url = %record.url,
                        publisher = publisher.name(),
                        error = %e,
                        "Publishing failed"
                    ),
                }
                Err(e)
            }
        }
    }
}
