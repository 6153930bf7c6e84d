use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sitemap_promo::{
    build_hashtag_pool, compose_tweet, derive_hashtags, HashtagStrategy, MetadataExtractor,
    PageMetadata,
};
use std::time::Duration;

const MOCK_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Free Ohm's Law Calculator</title>
    <meta property="og:title" content="Ohm's Law Calculator - Voltage, Current, Resistance">
    <meta name="description" content="Calculate voltage, current and resistance instantly.">
    <meta name="keywords" content="electronics, circuits, ohm, voltage, calculator">
</head>
<body>
    <h1>Ohm's Law</h1>
</body>
</html>"#;

fn bench_compose(c: &mut Criterion) {
    let meta = MetadataExtractor::new().extract(MOCK_HTML);
    let long_meta = PageMetadata::from_pairs([
        ("title", "A".repeat(400).as_str()),
        ("keywords", "rust, async, tokio, networking, systems, performance"),
    ]);
    let url = "https://example.com/tools/ohms-law-calculator";

    let mut group = c.benchmark_group("compose");

    group
        .sample_size(100)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));

    group.bench_function("compose_tweet", |b| {
        b.iter(|| black_box(compose_tweet(black_box(&meta), black_box(url))))
    });

    group.bench_function("compose_tweet_truncated", |b| {
        b.iter(|| black_box(compose_tweet(black_box(&long_meta), black_box(url))))
    });

    let keywords = meta.keyword_list();
    group.bench_function("derive_hashtags", |b| {
        b.iter(|| black_box(derive_hashtags(black_box(&keywords), black_box(&meta.title))))
    });

    group.bench_function("build_hashtag_pool", |b| {
        b.iter(|| {
            black_box(build_hashtag_pool(
                black_box(&meta.keywords),
                &[],
                black_box(&meta.title),
                HashtagStrategy::Auto,
            ))
        })
    });

    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let extractor = MetadataExtractor::new();

    c.bench_function("extract_metadata", |b| {
        b.iter(|| black_box(extractor.extract(black_box(MOCK_HTML))))
    });
}

criterion_group!(benches, bench_compose, bench_extract);
criterion_main!(benches);
