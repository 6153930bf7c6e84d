//! Tests for LLM-written posts and the fallback to the local composer

#[cfg(feature = "llm")]
mod llm_tests {
    use async_trait::async_trait;
    use sitemap_promo::{
        compose_tweet, GenerationConfig, HashtagStrategy, LlmComposer, MockProvider, PageCapture,
        PageMetadata, PostStyle, PromoError, PromoPipeline, RunConfig, SitemapSource,
        LOCAL_GENERATOR,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    const URL: &str = "https://example.com/tools/ohm";

    fn ohm_meta() -> PageMetadata {
        PageMetadata::from_pairs([
            ("og:title", "Ohm's Law Calculator"),
            ("description", "Solve for voltage, current or resistance."),
            ("keywords", "electronics, circuits"),
        ])
    }

    #[tokio::test]
    async fn test_request_carries_style_and_generation() {
        let provider = Arc::new(MockProvider::with_text(format!("Ohm in one click {URL} #EE")));
        let style = PostStyle::default()
            .with_tone("playful")
            .with_brand("Acme Labs")
            .with_cta("Open it")
            .with_hashtag_strategy(HashtagStrategy::Popular);
        let composer = LlmComposer::new(provider.clone())
            .with_style(style)
            .with_generation(GenerationConfig::default().with_temperature(0.2).with_max_tokens(80));

        let text = composer.compose(&ohm_meta(), URL).await.unwrap();
        assert_eq!(text, format!("Ohm in one click {URL} #EE"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, 80);
        assert!(request.prompt.contains(&format!("- Include this URL: {URL}")));
        assert!(request.prompt.contains("- Tone: playful. Brand voice: Acme Labs."));
        assert!(request.prompt.contains("'Open it'"));
        assert!(request.prompt.contains("#Electronics"));
        assert!(request.prompt.contains("- Title: Ohm's Law Calculator"));
        assert!(request.schema["properties"]["text"].is_object());
    }

    #[tokio::test]
    async fn test_explicit_hashtags_replace_the_pool() {
        let provider = Arc::new(MockProvider::with_text("ok"));
        let style = PostStyle::default().with_hashtags(vec!["#Acme".into(), "#Ohm".into()]);
        let composer = LlmComposer::new(provider.clone()).with_style(style);

        composer.compose(&ohm_meta(), URL).await.unwrap();
        let prompt = &provider.requests()[0].prompt;
        assert!(prompt.contains("hashtags from this list only: #Acme, #Ohm"));
    }

    #[tokio::test]
    async fn test_unusable_answers_are_errors() {
        let empty = LlmComposer::new(Arc::new(MockProvider::with_text("   ")));
        assert!(matches!(
            empty.compose(&ohm_meta(), URL).await,
            Err(PromoError::ParseError(_))
        ));

        let long = LlmComposer::new(Arc::new(MockProvider::with_text("x".repeat(281))));
        assert!(matches!(
            long.compose(&ohm_meta(), URL).await,
            Err(PromoError::ParseError(_))
        ));

        let bare = LlmComposer::new(Arc::new(MockProvider::with_answer(serde_json::json!(
            "plain answer"
        ))));
        assert_eq!(bare.compose(&ohm_meta(), URL).await.unwrap(), "plain answer");

        let down = LlmComposer::new(Arc::new(MockProvider::failing("503")));
        assert!(matches!(
            down.compose(&ohm_meta(), URL).await,
            Err(PromoError::ExternalServiceError { .. })
        ));
    }

    struct FixedPage;

    #[async_trait]
    impl PageCapture for FixedPage {
        async fn screenshot(&self, _url: &str, _out_dir: &Path) -> Result<PathBuf, PromoError> {
            Err(PromoError::UnsupportedOperation("no browser".into()))
        }

        async fn metadata(&self, _url: &str) -> Result<PageMetadata, PromoError> {
            Ok(ohm_meta())
        }
    }

    #[tokio::test]
    async fn test_overlong_answer_falls_back_in_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let sitemap = dir.path().join("sitemap.xml");
        std::fs::write(
            &sitemap,
            format!("<urlset><url><loc>{URL}</loc></url></urlset>"),
        )
        .unwrap();

        let config = RunConfig::default()
            .with_sitemap(SitemapSource::File(sitemap))
            .with_out_dir(dir.path().join("out"))
            .with_publish_delay(Duration::ZERO);
        let composer = LlmComposer::new(Arc::new(MockProvider::with_text("y".repeat(300))));
        let pipeline = PromoPipeline::new(config, Arc::new(FixedPage)).with_llm(composer);

        let summary = pipeline.run().await.unwrap();
        let record = &summary.records[0];
        assert_eq!(record.generated_by, LOCAL_GENERATOR);
        assert_eq!(record.tweet, compose_tweet(&ohm_meta(), URL));
    }
}
