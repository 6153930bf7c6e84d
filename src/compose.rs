//! Deterministic post composition.
//!
//! Builds a tweet-shaped string from page metadata and the page URL, deriving
//! up to three hashtags from the meta keywords (falling back to the title) and
//! fitting the result into [`MAX_LEN`] code points without breaking the URL.

use crate::PageMetadata;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Maximum post length in Unicode code points.
pub const MAX_LEN: usize = 280;

/// Maximum number of derived hashtags.
pub const MAX_HASHTAGS: usize = 3;

pub const LEAD_MARKER: &str = "⚡️";
pub const FALLBACK_TITLE: &str = "Check this out";
pub const TOOL_CTA: &str = "Try it";
pub const DEFAULT_CTA: &str = "Learn more";

const TOOL_HINTS: [&str; 3] = ["calculator", "tool", "generator"];

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    "a an and the for to of with in on at from by your our you we us is are this that it as be or if into about using make get free new"
        .split_whitespace()
        .collect()
});

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Canonical hashtag for common domain terms.
pub fn canonical_hashtag(token: &str) -> Option<&'static str> {
    let tag = match token {
        "crypto" => "#crypto",
        "cryptography" => "#cryptography",
        "security" => "#security",
        "privacy" => "#privacy",
        "ssl" => "#ssl",
        "tls" => "#tls",
        "certificate" | "pki" => "#PKI",
        "ssl/tls" => "#TLS",
        "electronics" => "#electronics",
        "circuits" => "#circuits",
        "ee" => "#EE",
        "stem" => "#STEM",
        "makers" => "#makers",
        "developer" => "#devtools",
        "tools" => "#tools",
        "calculator" => "#calculator",
        _ => return None,
    };
    Some(tag)
}

// Collects hashtags in discovery order, de-duplicating case-insensitively.
#[derive(Default)]
struct HashtagPicker {
    tags: Vec<String>,
    seen: HashSet<String>,
}

impl HashtagPicker {
    fn offer(&mut self, tag: String) {
        if tag.len() <= 1 || self.is_full() {
            return;
        }
        if self.seen.insert(tag.to_lowercase()) {
            self.tags.push(tag);
        }
    }

    fn is_full(&self) -> bool {
        self.tags.len() >= MAX_HASHTAGS
    }

    fn into_tags(self) -> Vec<String> {
        self.tags
    }
}

fn synthesize_hashtag(token: &str) -> String {
    let body: String = token.chars().filter(char::is_ascii_alphanumeric).collect();
    format!("#{body}")
}

fn is_keyword_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '/' | '-')
}

/// Derive up to three hashtags, keyword-derived tags first, then title words.
pub fn derive_hashtags<S: AsRef<str>>(keywords: &[S], title: &str) -> Vec<String> {
    let mut picker = HashtagPicker::default();

    for keyword in keywords {
        let lowered = keyword.as_ref().to_lowercase();
        for token in lowered.split(is_keyword_separator) {
            if token.is_empty() || is_stopword(token) {
                continue;
            }
            let tag = canonical_hashtag(token)
                .map(String::from)
                .unwrap_or_else(|| synthesize_hashtag(token));
            picker.offer(tag);
            if picker.is_full() {
                return picker.into_tags();
            }
        }
    }

    let lowered = title.to_lowercase();
    for token in lowered.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.len() < 3 || is_stopword(token) {
            continue;
        }
        let tag = canonical_hashtag(token)
            .map(String::from)
            .unwrap_or_else(|| format!("#{token}"));
        picker.offer(tag);
        if picker.is_full() {
            break;
        }
    }

    picker.into_tags()
}

/// Tool-like pages get the action phrase, everything else the neutral one.
pub fn call_to_action(title: &str) -> &'static str {
    let lowered = title.to_lowercase();
    if TOOL_HINTS.iter().any(|hint| lowered.contains(hint)) {
        TOOL_CTA
    } else {
        DEFAULT_CTA
    }
}

/// Compose the deterministic promotional post for a page.
pub fn compose_tweet(meta: &PageMetadata, url: &str) -> String {
    let title = meta.resolved_title().unwrap_or(FALLBACK_TITLE);
    let description = meta.resolved_description().unwrap_or_default();
    let keywords = meta.keyword_list();

    let hashtags = derive_hashtags(&keywords, title);
    let cta = call_to_action(title);

    let mut lead = format!("{LEAD_MARKER} {title}.");
    if !description.is_empty() {
        lead.push(' ');
        lead.push_str(description);
    }
    let hashtag_block = hashtags.join(" ");

    let tweet = [lead.trim(), url, hashtag_block.as_str(), cta]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    fit_to_length(tweet, url, MAX_LEN)
}

/// Shrink `tweet` to `max_len` code points, cutting the text before the URL
/// first so the URL stays intact, and hard-truncating as a last resort.
pub fn fit_to_length(tweet: String, url: &str, max_len: usize) -> String {
    let mut tweet = tweet;

    if char_len(&tweet) > max_len && !url.is_empty() {
        if let Some((before, after)) = tweet.split_once(url) {
            tweet = anchor_on_url(before.trim(), url, after.trim(), max_len);
        }
    }

    if char_len(&tweet) > max_len {
        tweet = take_chars(&tweet, max_len).trim_end().to_string();
    }

    tweet
}

fn anchor_on_url(head: &str, url: &str, tail: &str, max_len: usize) -> String {
    let reserved = char_len(url) + 1;
    let tail_len = char_len(tail);

    match max_len.checked_sub(reserved + tail_len + 1) {
        Some(budget) => {
            let head = take_chars(head, budget).trim_end();
            format!("{head} {url} {tail}").trim().to_string()
        }
        // Tail alone overflows: drop the head and cut the tail after the URL.
        None if reserved <= max_len => {
            let tail = take_chars(tail, max_len - reserved).trim_end();
            format!("{url} {tail}").trim().to_string()
        }
        None => format!("{head} {url} {tail}").trim().to_string(),
    }
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> PageMetadata {
        PageMetadata::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_keyword_tags_come_first() {
        let tags = derive_hashtags(&["electronics", "circuits"], "Free Ohm's Law Calculator");
        assert_eq!(tags, vec!["#electronics", "#circuits", "#ohm"]);
    }

    #[test]
    fn test_canonical_lookup_and_split() {
        let tags = derive_hashtags(&["SSL/TLS certificate"], "");
        assert_eq!(tags, vec!["#ssl", "#tls", "#PKI"]);
    }

    #[test]
    fn test_dedup_is_case_insensitive() {
        // "e.e" synthesizes "#ee", which collides with the canonical "#EE".
        let tags = derive_hashtags(&["ee", "e.e", "certificate", "pki"], "");
        assert_eq!(tags, vec!["#EE", "#PKI"]);
    }

    #[test]
    fn test_stripped_to_marker_is_discarded() {
        let tags = derive_hashtags(&["!!!", "c++"], "");
        assert_eq!(tags, vec!["#c"]);
    }

    #[test]
    fn test_stopwords_only_yields_nothing() {
        let tags = derive_hashtags(&["the and", "free/new", "with-your"], "A to Z of it");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_empty_inputs_yield_nothing() {
        let empty: [&str; 0] = [];
        assert!(derive_hashtags(&empty, "").is_empty());
    }

    #[test]
    fn test_title_fallback_skips_short_tokens() {
        let empty: [&str; 0] = [];
        let tags = derive_hashtags(&empty, "PDF to JPG Converter Tools");
        assert_eq!(tags, vec!["#pdf", "#jpg", "#converter"]);
    }

    #[test]
    fn test_never_more_than_three() {
        let tags = derive_hashtags(&["one two three four five"], "six seven eight");
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_call_to_action() {
        assert_eq!(call_to_action("JSON Generator"), TOOL_CTA);
        assert_eq!(call_to_action("Best ToolKit"), TOOL_CTA);
        assert_eq!(call_to_action("About us"), DEFAULT_CTA);
    }

    #[test]
    fn test_compose_tool_page() {
        let m = meta(&[
            ("title", "Free Ohm's Law Calculator"),
            ("keywords", "electronics, circuits"),
        ]);
        let tweet = compose_tweet(&m, "https://example.com/ohm");
        assert_eq!(
            tweet,
            "⚡️ Free Ohm's Law Calculator. https://example.com/ohm #electronics #circuits #ohm Try it"
        );
    }

    #[test]
    fn test_compose_empty_everything() {
        let tweet = compose_tweet(&PageMetadata::default(), "");
        assert_eq!(tweet, "⚡️ Check this out. Learn more");
        assert!(!tweet.contains("  "));
        assert!(!tweet.contains('#'));
    }

    #[test]
    fn test_compose_prefers_open_graph() {
        let m = meta(&[
            ("title", "Plain title"),
            ("og:title", "OG title"),
            ("description", "plain"),
            ("og:description", "Open Graph description"),
        ]);
        let tweet = compose_tweet(&m, "https://example.com");
        assert!(tweet.starts_with("⚡️ OG title. Open Graph description https://example.com"));
    }

    #[test]
    fn test_long_text_keeps_url_and_tail() {
        let url = "https://example.com/some/long/path";
        let description = "word ".repeat(80);
        let m = meta(&[
            ("title", "Long Read"),
            ("description", description.as_str()),
            ("keywords", "tls, pki"),
        ]);
        let tweet = compose_tweet(&m, url);

        assert!(char_len(&tweet) <= MAX_LEN);
        assert!(tweet.contains(url));
        assert_eq!(tweet, tweet.trim());
        assert!(tweet.ends_with(&format!("{url} #tls #PKI #long Learn more")));
    }

    #[test]
    fn test_oversized_tail_still_keeps_url() {
        let url = "https://example.com/p";
        let keyword = "x".repeat(300);
        let m = meta(&[("title", "Page"), ("keywords", keyword.as_str())]);
        let tweet = compose_tweet(&m, url);

        assert!(char_len(&tweet) <= MAX_LEN);
        assert!(tweet.starts_with(url));
    }

    #[test]
    fn test_url_longer_than_limit_is_hard_truncated() {
        let url = format!("https://example.com/{}", "a".repeat(300));
        let tweet = compose_tweet(&meta(&[("title", "Page")]), &url);
        assert_eq!(char_len(&tweet), MAX_LEN);
        assert_eq!(tweet, tweet.trim_end());
    }

    #[test]
    fn test_url_of_exactly_279_chars_survives() {
        let url = format!("https://e.com/{}", "b".repeat(279 - 14));
        assert_eq!(char_len(&url), 279);
        let description = "text ".repeat(20);
        let m = meta(&[("title", "Title"), ("description", description.as_str())]);
        let tweet = compose_tweet(&m, &url);
        assert!(char_len(&tweet) <= MAX_LEN);
        assert!(tweet.contains(&url));
    }

    #[test]
    fn test_counts_code_points_not_bytes() {
        let title = "é".repeat(200);
        let m = meta(&[("title", title.as_str()), ("description", title.as_str())]);
        let url = "https://example.com/accents";
        let tweet = compose_tweet(&m, url);
        assert!(char_len(&tweet) <= MAX_LEN);
        assert!(tweet.contains(url));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let m = meta(&[("title", "Hash Generator"), ("keywords", "crypto, sha256")]);
        let url = "https://example.com/hash";
        assert_eq!(compose_tweet(&m, url), compose_tweet(&m, url));
    }

    #[test]
    fn test_length_and_url_over_many_inputs() {
        let urls = [
            "https://example.com/a",
            "https://example.com/tools/unit-converter?from=m&to=ft",
            "https://sub.example.org/x/y/z/",
        ];
        for (i, url) in urls.iter().enumerate() {
            for n in [0usize, 10, 40, 90, 200] {
                let title = format!("Tool number {i} ").repeat(n / 10 + 1);
                let description = "lorem ipsum ".repeat(n);
                let keywords = format!("electronics, dev-{n}, {}", "k".repeat(n));
                let m = meta(&[
                    ("title", title.as_str()),
                    ("description", description.as_str()),
                    ("keywords", keywords.as_str()),
                ]);
                let tweet = compose_tweet(&m, url);
                assert!(char_len(&tweet) <= MAX_LEN, "too long for n={n}");
                assert!(tweet.contains(url), "url lost for n={n}");
                assert_eq!(tweet, tweet.trim());

                let tags = derive_hashtags(&m.keyword_list(), &title);
                assert!(tags.len() <= MAX_HASHTAGS);
                assert!(tags.iter().all(|t| t.starts_with('#')));
                let lowered: HashSet<_> = tags.iter().map(|t| t.to_lowercase()).collect();
                assert_eq!(lowered.len(), tags.len());
            }
        }
    }
}
