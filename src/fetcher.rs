use crate::{MetadataExtractor, PageMetadata, PromoError};
use reqwest::{header::HeaderMap, Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, instrument};

const DEFAULT_USER_AGENT: &str = concat!("sitemap-promo/", env!("CARGO_PKG_VERSION"));

/// Plain HTTP fetcher for sitemaps and for pages that do not need a browser.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    extractor: MetadataExtractor,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        debug!("Fetcher initialized with default configuration");
        Self::new_with_config(FetcherConfig::default())
    }

    pub fn new_with_config(config: FetcherConfig) -> Self {
        let mut client_builder = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .pool_max_idle_per_host(10);

        if let Some(headers) = config.headers {
            client_builder = client_builder.default_headers(headers);
        }

        if let Some(redirect_policy) = config.redirect_policy {
            client_builder = client_builder.redirect(redirect_policy);
        }

        let client = client_builder.build().unwrap_or_else(|e| {
            error!(error = %e, "Failed to create configured HTTP client, using defaults");
            Client::new()
        });

        Self::with_client(client)
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            extractor: MetadataExtractor::new(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch a body as text. `Ok(None)` means the server answered 404.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn fetch_optional(&self, url: &str) -> Result<Option<String>, PromoError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to send request");
            if e.is_timeout() {
                PromoError::TimeoutError(e.to_string())
            } else {
                PromoError::FetchError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PromoError::FetchError(format!(
                "{url} returned status {status}"
            )));
        }

        let content = response.text().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to read response body");
            PromoError::FetchError(e.to_string())
        })?;

        debug!(url = %url, content_length = content.len(), "Successfully fetched");
        Ok(Some(content))
    }

    pub async fn fetch(&self, url: &str) -> Result<String, PromoError> {
        self.fetch_optional(url)
            .await?
            .ok_or_else(|| PromoError::FetchError(format!("{url} returned status 404")))
    }

    /// Fetch a page and read its meta tags without rendering it.
    pub async fn fetch_metadata(&self, url: &str) -> Result<PageMetadata, PromoError> {
        let html = self.fetch(url).await?;
        Ok(self.extractor.extract(&html))
    }
}

/// Creates a fetcher with custom configuration.
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     user_agent: "my-custom-agent/1.0".to_string(),
///     timeout: Duration::from_secs(20),
///     ..Default::default()
/// });
/// ```
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub headers: Option<HeaderMap>,
    pub redirect_policy: Option<reqwest::redirect::Policy>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            headers: None,
            redirect_policy: Some(reqwest::redirect::Policy::limited(10)),
        }
    }
}

impl FetcherConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
