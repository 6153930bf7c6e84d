use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Page metadata consumed by the composers.
///
/// Only the five recognized keys are kept; every value defaults to an empty
/// string. Serializes as a flat object keyed by the meta tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "og:title", default)]
    pub og_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "og:description", default)]
    pub og_description: String,
    #[serde(default)]
    pub keywords: String,
}

impl PageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs, later pairs overwriting earlier ones.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut meta = Self::default();
        for (key, value) in pairs {
            meta.insert(key, value);
        }
        meta
    }

    /// Set a recognized key. Returns `false` for keys outside the model.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match key {
            "title" => &mut self.title,
            "og:title" => &mut self.og_title,
            "description" => &mut self.description,
            "og:description" => &mut self.og_description,
            "keywords" => &mut self.keywords,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "title" => Some(&self.title),
            "og:title" => Some(&self.og_title),
            "description" => Some(&self.description),
            "og:description" => Some(&self.og_description),
            "keywords" => Some(&self.keywords),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.og_title.is_empty()
            && self.description.is_empty()
            && self.og_description.is_empty()
            && self.keywords.is_empty()
    }

    /// `og:title`, else `title`, else `None`.
    pub fn resolved_title(&self) -> Option<&str> {
        first_non_empty(&self.og_title, &self.title)
    }

    /// `og:description`, else `description`, else `None`.
    pub fn resolved_description(&self) -> Option<&str> {
        first_non_empty(&self.og_description, &self.description)
    }

    /// Comma separated keywords, trimmed, empty segments dropped.
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    }
}

fn first_non_empty<'a>(preferred: &'a str, fallback: &'a str) -> Option<&'a str> {
    if !preferred.is_empty() {
        Some(preferred)
    } else if !fallback.is_empty() {
        Some(fallback)
    } else {
        None
    }
}

/// Metadata extractor, responsible for reading the promo-relevant meta tags
/// out of a rendered page
#[derive(Clone)]
pub struct MetadataExtractor;

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, html: &str) -> PageMetadata {
        let document = Html::parse_document(html);

        let meta = PageMetadata {
            title: self.extract_title(&document).unwrap_or_default(),
            og_title: self
                .extract_meta(&document, "meta[property='og:title']")
                .unwrap_or_default(),
            description: self
                .extract_meta(&document, "meta[name='description']")
                .unwrap_or_default(),
            og_description: self
                .extract_meta(&document, "meta[property='og:description']")
                .unwrap_or_default(),
            keywords: self
                .extract_meta(&document, "meta[name='keywords']")
                .unwrap_or_default(),
        };

        debug!(
            title = %meta.title,
            og_title = %meta.og_title,
            keywords = %meta.keywords,
            "Metadata extraction results"
        );
        meta
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        let title_selector = Selector::parse("title").ok()?;

        document
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .map(|s| s.trim().to_string())
    }

    // First matching tag that carries a `content` attribute.
    fn extract_meta(&self, document: &Html, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;

        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
    }
}
