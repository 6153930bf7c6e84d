//! Run artifacts: `posts.json`, `posts.csv` and `posts.md`.

use crate::{PageMetadata, PromoError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const JSON_FILE: &str = "posts.json";
pub const CSV_FILE: &str = "posts.csv";
pub const MARKDOWN_FILE: &str = "posts.md";

/// `generated_by` value for posts written by the deterministic composer.
pub const LOCAL_GENERATOR: &str = "local";

/// One processed page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub url: String,
    /// Screenshot path, empty when none was taken
    pub image: String,
    pub tweet: String,
    pub generated_by: String,
    pub meta: PageMetadata,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub x_tweet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub x_url: Option<String>,
}

impl PostRecord {
    pub fn new(url: impl Into<String>, tweet: impl Into<String>, meta: PageMetadata) -> Self {
        Self {
            url: url.into(),
            image: String::new(),
            tweet: tweet.into(),
            generated_by: LOCAL_GENERATOR.to_string(),
            meta,
            x_tweet_id: None,
            x_url: None,
        }
    }

    pub fn with_image(mut self, image: Option<&Path>) -> Self {
        self.image = image.map(|p| p.display().to_string()).unwrap_or_default();
        self
    }

    pub fn with_generator(mut self, generated_by: impl Into<String>) -> Self {
        self.generated_by = generated_by.into();
        self
    }

    pub fn is_published(&self) -> bool {
        self.x_tweet_id.is_some()
    }
}

/// Paths of the written artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub markdown: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            json: dir.join(JSON_FILE),
            csv: dir.join(CSV_FILE),
            markdown: dir.join(MARKDOWN_FILE),
        }
    }
}

pub fn render_json(records: &[PostRecord]) -> Result<String, PromoError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// `url,image,tweet` rows with standard CSV quoting.
pub fn render_csv(records: &[PostRecord]) -> Result<String, PromoError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["url", "image", "tweet"])?;
    for record in records {
        writer.write_record([&record.url, &record.image, &record.tweet])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PromoError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| PromoError::ParseError(e.to_string()))
}

/// Checklist for posting by hand.
pub fn render_markdown(records: &[PostRecord]) -> String {
    records
        .iter()
        .flat_map(|r| {
            [
                format!("- URL: {}", r.url),
                format!("  Image: {}", r.image),
                format!("  Tweet: {}", r.tweet),
                String::new(),
            ]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write all three artifacts into `dir`, creating it if needed.
pub fn write_outputs(dir: &Path, records: &[PostRecord]) -> Result<OutputPaths, PromoError> {
    std::fs::create_dir_all(dir)?;
    let paths = OutputPaths::in_dir(dir);

    std::fs::write(&paths.json, render_json(records)?)?;
    std::fs::write(&paths.csv, render_csv(records)?)?;
    std::fs::write(&paths.markdown, render_markdown(records))?;

    info!(
        dir = %dir.display(),
        records = records.len(),
        "Wrote run artifacts"
    );
    Ok(paths)
}
