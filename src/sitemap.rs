//! Sitemap reading, URL filtering and sampling.

use crate::{Fetcher, PromoError};
use quick_xml::events::Event;
use quick_xml::Reader;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Where the sitemap comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapSource {
    File(PathBuf),
    Remote(String),
}

impl SitemapSource {
    pub async fn load(&self, fetcher: &Fetcher) -> Result<Vec<String>, PromoError> {
        match self {
            SitemapSource::File(path) => read_sitemap(path),
            SitemapSource::Remote(url) => fetch_sitemap(url, fetcher).await,
        }
    }
}

impl FromStr for SitemapSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Ok(SitemapSource::Remote(s.to_string()))
        } else {
            Ok(SitemapSource::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for SitemapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SitemapSource::File(path) => write!(f, "{}", path.display()),
            SitemapSource::Remote(url) => f.write_str(url),
        }
    }
}

pub fn read_sitemap(path: &Path) -> Result<Vec<String>, PromoError> {
    if !path.is_file() {
        return Err(PromoError::SitemapNotFound(path.display().to_string()));
    }
    let xml = std::fs::read_to_string(path).map_err(|e| {
        PromoError::InvalidSitemap(format!("failed to read {}: {e}", path.display()))
    })?;
    parse_sitemap(&xml)
}

pub async fn fetch_sitemap(url: &str, fetcher: &Fetcher) -> Result<Vec<String>, PromoError> {
    debug!(url = %url, "Fetching remote sitemap");
    let xml = fetcher
        .fetch_optional(url)
        .await?
        .ok_or_else(|| PromoError::SitemapNotFound(url.to_string()))?;
    parse_sitemap(&xml)
}

/// Every `loc` element's text, in document order.
///
/// Elements are matched on their local name, so `<loc>`, `<sm:loc>` and
/// `<image:loc>` all count regardless of the namespaces declared.
pub fn parse_sitemap(xml: &str) -> Result<Vec<String>, PromoError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut in_loc = false;
    let mut current = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"loc" => {
                in_loc = true;
                current.clear();
            }
            Ok(Event::Text(ref e)) if in_loc => {
                let text = e.unescape().map_err(|err| {
                    PromoError::InvalidSitemap(format!("bad text in <loc>: {err}"))
                })?;
                current.push_str(&text);
            }
            Ok(Event::CData(ref e)) if in_loc => {
                current.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"loc" => {
                in_loc = false;
                let url = current.trim();
                if !url.is_empty() {
                    urls.push(url.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PromoError::InvalidSitemap(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    info!(count = urls.len(), "Parsed sitemap");
    Ok(urls)
}

/// Split a comma separated pattern list into lowercase, non-empty patterns.
pub fn parse_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Drop URLs containing any of the patterns, ignoring case.
pub fn exclude_urls(urls: Vec<String>, patterns: &[String]) -> Vec<String> {
    let patterns: Vec<String> = patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return urls;
    }

    urls.into_iter()
        .filter(|url| {
            let lowered = url.to_lowercase();
            patterns.iter().all(|p| !lowered.contains(p.as_str()))
        })
        .collect()
}

/// Pick `min(count, urls.len())` URLs at random; a seed makes the pick reproducible.
pub fn sample_urls(urls: &[String], count: usize, seed: Option<u64>) -> Vec<String> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    urls.choose_multiple(&mut rng, count.min(urls.len()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>
      https://example.com/
    </loc>
    <lastmod>2024-01-01</lastmod>
  </url>
  <url>
    <loc>https://example.com/tools/ohm?a=1&amp;b=2</loc>
    <image:image><image:loc>https://example.com/ohm.png</image:loc></image:image>
  </url>
  <url><loc><![CDATA[https://example.com/docs/intro]]></loc></url>
  <url><loc>   </loc></url>
</urlset>"#;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_sitemap_collects_all_locs() {
        let parsed = parse_sitemap(SITEMAP).unwrap();
        assert_eq!(
            parsed,
            urls(&[
                "https://example.com/",
                "https://example.com/tools/ohm?a=1&b=2",
                "https://example.com/ohm.png",
                "https://example.com/docs/intro",
            ])
        );
    }

    #[test]
    fn test_parse_prefixed_namespace() {
        let xml = r#"<sm:urlset xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sm:url><sm:loc>https://a.example/</sm:loc></sm:url>
        </sm:urlset>"#;
        assert_eq!(parse_sitemap(xml).unwrap(), urls(&["https://a.example/"]));
    }

    #[test]
    fn test_parse_invalid_xml() {
        let result = parse_sitemap("<urlset><url><loc>x</url></urlset>");
        assert!(matches!(result, Err(PromoError::InvalidSitemap(_))));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_sitemap(Path::new("/definitely/not/here/sitemap.xml"));
        assert!(matches!(result, Err(PromoError::SitemapNotFound(_))));
    }

    #[test]
    fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitemap.xml");
        std::fs::write(&path, SITEMAP).unwrap();
        assert_eq!(read_sitemap(&path).unwrap().len(), 4);
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!(
            "https://example.com/sitemap.xml".parse::<SitemapSource>().unwrap(),
            SitemapSource::Remote("https://example.com/sitemap.xml".into())
        );
        assert_eq!(
            "out/sitemap.xml".parse::<SitemapSource>().unwrap(),
            SitemapSource::File(PathBuf::from("out/sitemap.xml"))
        );
    }

    #[test]
    fn test_exclude_is_case_insensitive() {
        let all = urls(&[
            "https://example.com/Docs/intro",
            "https://example.com/tools/ohm",
            "https://example.com/blog/post",
        ]);
        let kept = exclude_urls(all, &parse_patterns(" /docs/ , /BLOG/,,"));
        assert_eq!(kept, urls(&["https://example.com/tools/ohm"]));
    }

    #[test]
    fn test_exclude_without_patterns_keeps_everything() {
        let all = urls(&["https://example.com/a", "https://example.com/b"]);
        assert_eq!(exclude_urls(all.clone(), &[]), all);
    }

    #[test]
    fn test_sample_is_reproducible_with_seed() {
        let all: Vec<String> = (0..50).map(|i| format!("https://example.com/{i}")).collect();
        let first = sample_urls(&all, 5, Some(42));
        let second = sample_urls(&all, 5, Some(42));
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);

        let unique: HashSet<_> = first.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(first.iter().all(|u| all.contains(u)));
    }

    #[test]
    fn test_sample_never_exceeds_input() {
        let all = urls(&["https://example.com/a", "https://example.com/b"]);
        assert_eq!(sample_urls(&all, 10, Some(1)).len(), 2);
        assert!(sample_urls(&all, 0, None).is_empty());
        assert!(sample_urls(&[], 3, None).is_empty());
    }
}
