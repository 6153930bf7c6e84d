//! Page capture: screenshots and metadata for a single URL.

use crate::{Fetcher, PageMetadata, PromoError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

#[cfg(feature = "browser")]
pub use browser::BrowserCapture;

pub const DEFAULT_VIEWPORT: (u32, u32) = (1200, 675);

/// Hosts of common ad and analytics networks.
pub const AD_HOST_PATTERNS: &[&str] = &[
    "googlesyndication.com",
    "googleads.g.doubleclick.net",
    "doubleclick.net",
    "adservice.google.com",
    "googletagservices.com",
    "googletagmanager.com",
    "adsystem.com",
    "taboola.com",
    "outbrain.com",
    "google-analytics.com",
    "analytics.google.com",
    "ssl.google-analytics.com",
    "stats.g.doubleclick.net",
    "statcounter.com",
    "sc-static.net",
    "c.statcounter.com",
];

/// Hides ad containers that render even with their hosts blocked.
pub const AD_HIDING_CSS: &str = r#"ins.adsbygoogle, iframe[src*="googlesyndication"],
[id^="google_ads_"], [id*="google_ads_iframe"],
[data-google-query-id], .carbonads, #carbonads,
.adslot, .ad-container, .adsbox { display: none !important; visibility: hidden !important; }"#;

/// Captures what a page looks like and what it says about itself.
#[async_trait]
pub trait PageCapture: Send + Sync {
    /// Save a viewport screenshot under `out_dir` and return its path.
    async fn screenshot(&self, url: &str, out_dir: &Path) -> Result<PathBuf, PromoError>;

    async fn metadata(&self, url: &str) -> Result<PageMetadata, PromoError>;

    /// Release external resources. Called once at the end of a run.
    async fn shutdown(&self) -> Result<(), PromoError> {
        Ok(())
    }
}

/// Page state a navigation waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    #[default]
    DomContentLoaded,
    Load,
    NetworkIdle,
}

impl WaitUntil {
    /// Browser-side predicate that holds once this state is reached.
    pub fn ready_script(&self) -> &'static str {
        match self {
            WaitUntil::DomContentLoaded => "() => document.readyState !== 'loading'",
            WaitUntil::Load => "() => document.readyState === 'complete'",
            WaitUntil::NetworkIdle => {
                "() => document.readyState === 'complete' && \
                 performance.getEntriesByType('resource').every(\
                 e => e.responseEnd > 0 && performance.now() - e.responseEnd > 500)"
            }
        }
    }
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "load" => Ok(WaitUntil::Load),
            "networkidle" => Ok(WaitUntil::NetworkIdle),
            other => Err(format!("unknown wait state: {other}")),
        }
    }
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkidle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub width: u32,
    pub height: u32,
    /// Navigation timeout of the first, strictest attempt
    pub timeout: Duration,
    pub wait_until: WaitUntil,
    pub block_ads: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT.0,
            height: DEFAULT_VIEWPORT.1,
            timeout: Duration::from_millis(30_000),
            wait_until: WaitUntil::default(),
            block_ads: true,
        }
    }
}

impl CaptureOptions {
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    pub fn with_block_ads(mut self, block_ads: bool) -> Self {
        self.block_ads = block_ads;
        self
    }

    /// Navigation attempts from strictest to most lenient.
    pub fn wait_plan(&self) -> Vec<(WaitUntil, Duration)> {
        vec![
            (self.wait_until, self.timeout),
            (WaitUntil::Load, self.timeout.mul_f64(1.5)),
            (WaitUntil::DomContentLoaded, self.timeout * 2),
        ]
    }
}

/// Metadata over plain HTTP, for runs without a browser.
#[derive(Clone, Default)]
pub struct HttpCapture {
    fetcher: Fetcher,
}

impl HttpCapture {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl PageCapture for HttpCapture {
    async fn screenshot(&self, url: &str, _out_dir: &Path) -> Result<PathBuf, PromoError> {
        Err(PromoError::UnsupportedOperation(format!(
            "screenshots need a browser ({url})"
        )))
    }

    #[instrument(level = "debug", skip(self))]
    async fn metadata(&self, url: &str) -> Result<PageMetadata, PromoError> {
        self.fetcher.fetch_metadata(url).await
    }
}

#[cfg(feature = "browser")]
mod browser {
    use super::*;
    use crate::attempts::{first_success, is_timeout};
    use crate::mcp_client::{McpClient, McpConfig};
    use crate::utils::sanitize_filename;
    use crate::MetadataExtractor;
    use tokio::sync::{Mutex, OnceCell};
    use tokio::time::Instant;
    use tracing::{debug, warn};

    const SETTLE_SECONDS: f64 = 1.5;
    const READY_POLL: Duration = Duration::from_millis(200);
    const REQUIRED_TOOLS: [&str; 5] = [
        "browser_resize",
        "browser_navigate",
        "browser_evaluate",
        "browser_wait_for",
        "browser_take_screenshot",
    ];

    /// Captures pages in a real browser driven through a Playwright MCP server.
    pub struct BrowserCapture {
        client: McpClient,
        options: CaptureOptions,
        fallback: Fetcher,
        extractor: MetadataExtractor,
        ready: OnceCell<()>,
        current_url: Mutex<Option<String>>,
    }

    impl BrowserCapture {
        pub fn new(options: CaptureOptions, mcp_config: McpConfig) -> Self {
            let mcp_config = if options.block_ads {
                mcp_config.with_blocked_origins(AD_HOST_PATTERNS.iter().copied())
            } else {
                mcp_config
            };

            Self {
                client: McpClient::new(mcp_config),
                options,
                fallback: Fetcher::new(),
                extractor: MetadataExtractor::new(),
                ready: OnceCell::new(),
                current_url: Mutex::new(None),
            }
        }

        pub fn with_fallback(mut self, fetcher: Fetcher) -> Self {
            self.fallback = fetcher;
            self
        }

        pub fn options(&self) -> &CaptureOptions {
            &self.options
        }

        async fn ensure_started(&self) -> Result<(), PromoError> {
            self.ready
                .get_or_try_init(|| async {
                    self.client.start().await?;
                    for tool in REQUIRED_TOOLS {
                        if !self.client.has_tool(tool).await {
                            return Err(PromoError::InvalidConfiguration(format!(
                                "MCP server does not offer {tool}"
                            )));
                        }
                    }
                    self.client
                        .resize(self.options.width, self.options.height)
                        .await
                })
                .await
                .map(|_| ())
        }

        async fn navigate_once(
            &self,
            url: &str,
            wait_until: WaitUntil,
            deadline: Duration,
        ) -> Result<(), PromoError> {
            let started = Instant::now();
            self.client.navigate(url, deadline).await?;

            loop {
                match self.client.evaluate(wait_until.ready_script()).await {
                    Ok(serde_json::Value::Bool(true)) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Ready-state check failed"),
                }
                if started.elapsed() >= deadline {
                    return Err(PromoError::TimeoutError(format!(
                        "{url} did not reach {wait_until} within {} ms",
                        deadline.as_millis()
                    )));
                }
                tokio::time::sleep(READY_POLL).await;
            }
        }

        /// Navigate through the wait plan. Only a timeout moves on to the next attempt.
        async fn open(&self, url: &str) -> Result<(), PromoError> {
            let result = first_success(
                self.options.wait_plan(),
                |(wait_until, deadline)| self.navigate_once(url, wait_until, deadline),
                is_timeout,
            )
            .await;

            // A timed out page is still shown and gets captured; any other
            // failure leaves the previous page on screen
            *self.current_url.lock().await = match &result {
                Ok(()) | Err(PromoError::TimeoutError(_)) => Some(url.to_string()),
                Err(_) => None,
            };
            result
        }

        async fn hide_ads(&self) -> Result<(), PromoError> {
            let css = serde_json::to_string(AD_HIDING_CSS)?;
            let script = format!(
                "() => {{ const style = document.createElement('style'); \
                 style.textContent = {css}; \
                 (document.head || document.documentElement).appendChild(style); \
                 return true; }}"
            );
            self.client.evaluate(&script).await.map(|_| ())
        }

        async fn page_metadata(&self, url: &str) -> Result<PageMetadata, PromoError> {
            self.ensure_started().await?;

            let already_open = self.current_url.lock().await.as_deref() == Some(url);
            if !already_open {
                self.open(url).await?;
            }

            let html = self.client.get_page_html().await?;
            Ok(self.extractor.extract(&html))
        }
    }

    #[async_trait]
    impl PageCapture for BrowserCapture {
        #[instrument(skip(self, out_dir))]
        async fn screenshot(&self, url: &str, out_dir: &Path) -> Result<PathBuf, PromoError> {
            self.ensure_started().await?;
            tokio::fs::create_dir_all(out_dir).await?;

            match self.open(url).await {
                Ok(()) => {}
                // Capture whatever has rendered so far
                Err(PromoError::TimeoutError(e)) => {
                    warn!(url = %url, error = %e, "Every wait state timed out");
                }
                Err(e) => return Err(e),
            }

            if let Err(e) = self.client.wait_for_seconds(SETTLE_SECONDS).await {
                debug!(error = %e, "Settle wait failed");
            }
            if self.options.block_ads {
                if let Err(e) = self.hide_ads().await {
                    debug!(error = %e, "Could not inject ad-hiding styles");
                }
            }

            let png = self.client.take_screenshot().await?;
            let path = out_dir.join(format!("{}.png", sanitize_filename(url)));
            tokio::fs::write(&path, png).await?;

            debug!(path = %path.display(), "Screenshot saved");
            Ok(path)
        }

        #[instrument(skip(self))]
        async fn metadata(&self, url: &str) -> Result<PageMetadata, PromoError> {
            match self.page_metadata(url).await {
                Ok(meta) => Ok(meta),
                Err(e) => {
                    warn!(url = %url, error = %e, "Browser metadata failed, falling back to HTTP");
                    self.fallback.fetch_metadata(url).await
                }
            }
        }

        async fn shutdown(&self) -> Result<(), PromoError> {
            self.client.stop().await
        }
    }

}
