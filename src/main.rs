use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitemap_promo::{
    log_error_card, log_post_card, parse_patterns, setup_logging, BrowserCapture, CaptureOptions,
    Fetcher, HashtagStrategy, HttpCapture, LLMConfig, LlmComposer, LogConfig, McpConfig,
    PageCapture, PostStyle, PromoError, PromoPipeline, ProviderKind, Publisher, RunConfig,
    RunEvent, RunSummary, SitemapSource, UrlValidationConfig, WaitUntil, XPublisher, DEFAULT_TONE,
    TOOL_CTA,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sitemap file path or http(s) URL
    #[arg(long, default_value = "sitemap.xml")]
    sitemap: SitemapSource,

    /// Number of URLs to pick
    #[arg(long, default_value_t = 2)]
    count: usize,

    /// Output directory for screenshots and post files
    #[arg(long, default_value = "outputs")]
    out: PathBuf,

    /// Comma separated substrings; matching URLs are skipped
    #[arg(long, default_value = "/docs/")]
    exclude_patterns: String,

    /// Seed for a reproducible pick
    #[arg(long)]
    seed: Option<u64>,

    /// Keep localhost and private-network URLs (for sites served locally)
    #[arg(long)]
    allow_local: bool,

    /// Viewport width
    #[arg(long, default_value_t = 1200)]
    width: u32,

    /// Viewport height
    #[arg(long, default_value_t = 675)]
    height: u32,

    /// Navigation timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout: u64,

    /// Page state to wait for: domcontentloaded, load or networkidle
    #[arg(long, default_value = "domcontentloaded")]
    wait_until: WaitUntil,

    /// Block ad networks and hide ad containers (default)
    #[arg(long, overrides_with = "no_block_ads")]
    block_ads: bool,

    /// Leave ads alone
    #[arg(long)]
    no_block_ads: bool,

    /// Skip the browser; collect metadata over HTTP without screenshots
    #[arg(long)]
    no_browser: bool,

    /// Write posts with an LLM, falling back to the local composer
    #[arg(long)]
    use_openai: bool,

    /// LLM provider: openai or anthropic
    #[arg(long, default_value = "openai")]
    llm_provider: ProviderKind,

    /// Model name; defaults to OPENAI_MODEL / ANTHROPIC_MODEL or the provider default
    #[arg(long, alias = "model")]
    openai_model: Option<String>,

    /// Tone for generated posts
    #[arg(long, default_value = DEFAULT_TONE)]
    tone: String,

    /// Brand voice for generated posts
    #[arg(long, default_value = "")]
    brand: String,

    /// Comma separated preferred hashtags
    #[arg(long, default_value = "")]
    hashtags: String,

    /// How the hashtag pool is built: auto, popular or input
    #[arg(long, default_value = "auto")]
    hashtag_strategy: HashtagStrategy,

    /// Call to action for generated posts
    #[arg(long, default_value = TOOL_CTA)]
    cta: String,

    /// Publish each post to X (needs TWITTER_POST and TWITTER_ACCESS_TOKEN)
    #[arg(long)]
    post_to_x: bool,

    /// Pause after each published post, in seconds
    #[arg(long, default_value_t = 2.0)]
    x_wait_seconds: f64,

    /// Do not attach alt text to uploaded screenshots
    #[arg(long)]
    x_no_alt: bool,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write a daily rolling log file into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn run_config(&self) -> RunConfig {
        let validation = if self.allow_local {
            UrlValidationConfig::default().allow_local()
        } else {
            UrlValidationConfig::default()
        };

        RunConfig::default()
            .with_sitemap(self.sitemap.clone())
            .with_count(self.count)
            .with_out_dir(self.out.clone())
            .with_exclude_patterns(parse_patterns(&self.exclude_patterns))
            .with_seed(self.seed)
            .with_validation(validation)
            .with_alt_text(!self.x_no_alt)
            .with_publish_delay(Duration::from_secs_f64(self.x_wait_seconds.max(0.0)))
    }

    fn capture_options(&self) -> CaptureOptions {
        CaptureOptions::default()
            .with_viewport(self.width, self.height)
            .with_timeout(Duration::from_millis(self.timeout))
            .with_wait_until(self.wait_until)
            .with_block_ads(self.block_ads || !self.no_block_ads)
    }

    fn post_style(&self) -> PostStyle {
        let hashtags = self
            .hashtags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect();

        PostStyle::default()
            .with_tone(self.tone.clone())
            .with_brand(self.brand.clone())
            .with_hashtags(hashtags)
            .with_cta(self.cta.clone())
            .with_hashtag_strategy(self.hashtag_strategy)
    }
}

fn build_capture(args: &Args) -> Arc<dyn PageCapture> {
    if args.no_browser {
        return Arc::new(HttpCapture::new(Fetcher::new()));
    }
    Arc::new(
        BrowserCapture::new(args.capture_options(), McpConfig::default())
            .with_fallback(Fetcher::new()),
    )
}

fn build_llm(args: &Args) -> Option<LlmComposer> {
    if !args.use_openai {
        return None;
    }
    match LLMConfig::provider_from_env(args.llm_provider, args.openai_model.clone()) {
        Ok(provider) => Some(LlmComposer::new(provider).with_style(args.post_style())),
        Err(e) => {
            warn!(error = %e, "LLM unavailable, posts will use the local composer");
            None
        }
    }
}

fn build_publisher(args: &Args) -> Option<Arc<dyn Publisher>> {
    if !args.post_to_x {
        return None;
    }
    match XPublisher::from_env() {
        Ok(publisher) => Some(Arc::new(publisher)),
        Err(e) => {
            e.log();
            None
        }
    }
}

async fn run(args: &Args) -> Result<RunSummary, PromoError> {
    let mut pipeline = PromoPipeline::new(args.run_config(), build_capture(args));
    if let Some(composer) = build_llm(args) {
        pipeline = pipeline.with_llm(composer);
    }
    if let Some(publisher) = build_publisher(args) {
        pipeline = pipeline.with_publisher(publisher);
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| PromoError::InvalidConfiguration(e.to_string()))?
            .progress_chars("#>-"),
    );

    let result = pipeline
        .run_with_progress(|event| match event {
            RunEvent::Selected(total) => pb.set_length(total as u64),
            RunEvent::Started(url) => pb.set_message(url.to_string()),
            // HTTP-only capture never has screenshots
            RunEvent::Failed {
                error: PromoError::UnsupportedOperation(_),
                ..
            } => {}
            RunEvent::Failed { url, error } => pb.suspend(|| log_error_card(url, error)),
            RunEvent::Finished(record) => {
                log_post_card(record);
                pb.inc(1);
            }
        })
        .await;

    pb.finish_and_clear();
    result
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "Generated posts".bold().blue());
    println!("{}", "---------------".blue());
    for record in &summary.records {
        println!("{}: {}", "URL".bold(), record.url);
        println!("{}: {} ({})", "Tweet".bold(), record.tweet, record.generated_by.dimmed());
        if !record.image.is_empty() {
            println!("{}: {}", "Image".bold(), record.image);
        }
        if let Some(x_url) = &record.x_url {
            println!("{}: {}", "Posted".bold().green(), x_url);
        }
        println!();
    }

    println!(
        "{} {} posts, {} screenshots, {} published",
        "Summary:".bold(),
        summary.records.len(),
        summary.with_screenshots(),
        summary.published()
    );
    println!(
        "{} {}, {}, {}",
        "Done. Wrote:".bold().green(),
        summary.outputs.json.display(),
        summary.outputs.csv.display(),
        summary.outputs.markdown.display()
    );
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_config = LogConfig {
        log_dir: args.log_dir.clone().unwrap_or_else(|| PathBuf::from("logs")),
        log_level: args.log_level.clone(),
        console_output: true,
        file_output: args.log_dir.is_some(),
    };
    if let Err(e) = setup_logging(log_config) {
        eprintln!("{}: {}", "Warning".bold().yellow(), e);
    }

    match run(&args).await {
        Ok(summary) => print_summary(&summary),
        Err(e) => {
            e.log();
            eprintln!("{}: {}", "Error".bold().red(), e);
            std::process::exit(e.exit_code());
        }
    }
}
