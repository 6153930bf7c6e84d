//! Behaviour of the deterministic composer across many inputs

use sitemap_promo::{
    char_len, compose_tweet, derive_hashtags, MetadataExtractor, PageMetadata, DEFAULT_CTA,
    MAX_LEN, TOOL_CTA,
};
use std::collections::HashSet;

fn sample_metas() -> Vec<PageMetadata> {
    let long_title = "Extremely Verbose Title ".repeat(20);
    let long_description = "A sentence about the page that keeps going. ".repeat(12);
    let emoji_title = "🚀🔥 Launch day ".repeat(30);

    vec![
        PageMetadata::new(),
        PageMetadata::from_pairs([("title", "Free Ohm's Law Calculator")]),
        PageMetadata::from_pairs([
            ("og:title", "JSON Formatter Tool"),
            ("description", "Pretty print JSON in your browser."),
            ("keywords", "json, formatter, developer tools"),
        ]),
        PageMetadata::from_pairs([
            ("title", long_title.as_str()),
            ("og:description", long_description.as_str()),
            ("keywords", "tls, certificate, x509, security, pki"),
        ]),
        PageMetadata::from_pairs([("title", emoji_title.as_str())]),
        PageMetadata::from_pairs([("keywords", "the, and, with, free, new, --, //")]),
        PageMetadata::from_pairs([("title", "   "), ("description", "\t")]),
    ]
}

fn sample_urls() -> Vec<String> {
    vec![
        "https://example.com/ohm".to_string(),
        "https://example.com/".to_string(),
        format!("https://example.com/{}", "deep/".repeat(40)),
        format!("https://example.com/{}", "x".repeat(278)),
    ]
}

#[test]
fn test_length_and_url_preserved_for_all_samples() {
    for meta in sample_metas() {
        for url in sample_urls() {
            let tweet = compose_tweet(&meta, &url);
            assert!(
                char_len(&tweet) <= MAX_LEN,
                "too long ({}) for {url}",
                char_len(&tweet)
            );
            if char_len(&url) + 1 <= MAX_LEN {
                assert!(tweet.contains(&url), "url dropped from {tweet:?}");
            }
        }
    }
}

#[test]
fn test_empty_url_still_fits() {
    for meta in sample_metas() {
        let tweet = compose_tweet(&meta, "");
        assert!(char_len(&tweet) <= MAX_LEN);
        assert!(!tweet.is_empty());
    }
}

#[test]
fn test_composition_is_idempotent() {
    for meta in sample_metas() {
        for url in sample_urls() {
            assert_eq!(compose_tweet(&meta, &url), compose_tweet(&meta, &url));
        }
    }
}

#[test]
fn test_hashtags_are_bounded_and_unique() {
    let inputs: Vec<(Vec<&str>, &str)> = vec![
        (vec![], ""),
        (vec!["electronics", "Electronics", "ELECTRONICS"], "Electronics"),
        (vec!["tls, certificate", "pki"], "TLS Certificate Checker"),
        (vec!["rust/async-tokio", "systems programming"], "Async Rust"),
        (vec!["!!!", "???"], "?? !!"),
        (vec![], "A tiny ox is on it"),
    ];

    for (keywords, title) in inputs {
        let tags = derive_hashtags(&keywords, title);
        assert!(tags.len() <= 3, "{tags:?}");

        let mut seen = HashSet::new();
        for tag in &tags {
            assert!(tag.starts_with('#') && tag.len() > 1, "{tag}");
            assert!(seen.insert(tag.to_lowercase()), "duplicate in {tags:?}");
        }
    }
}

#[test]
fn test_ohm_calculator_example() {
    let meta = PageMetadata::from_pairs([
        ("title", "Free Ohm's Law Calculator"),
        ("keywords", "electronics, circuits"),
    ]);
    let url = "https://example.com/ohm";
    let tweet = compose_tweet(&meta, url);

    assert!(tweet.ends_with(TOOL_CTA));
    assert!(tweet.contains(url));

    let tags = derive_hashtags(&meta.keyword_list(), "Free Ohm's Law Calculator");
    assert_eq!(tags[0], "#electronics");
}

#[test]
fn test_neutral_call_to_action() {
    let meta = PageMetadata::from_pairs([("title", "Release notes for March")]);
    assert!(compose_tweet(&meta, "https://example.com/notes").ends_with(DEFAULT_CTA));
}

#[test]
fn test_compose_from_extracted_html() {
    let html = r#"<html><head>
        <title>Base64 Encoder</title>
        <meta property="og:title" content="Base64 Encoder Tool">
        <meta name="description" content="Encode and decode Base64 online.">
        <meta name="keywords" content="base64, encoding">
    </head></html>"#;

    let meta = MetadataExtractor::new().extract(html);
    let tweet = compose_tweet(&meta, "https://example.com/base64");

    assert!(tweet.contains("Base64 Encoder Tool."));
    assert!(tweet.contains("Encode and decode Base64 online."));
    assert!(tweet.ends_with(TOOL_CTA));
}
