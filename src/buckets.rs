//! Topic buckets used to shortlist higher-reach hashtags for the LLM prompt.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Maximum size of the hashtag pool offered to the LLM.
pub const MAX_POOL_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Security,
    Crypto,
    Dev,
    Electronics,
    Math,
    Physics,
    Chemistry,
    Pdf,
    Video,
    Devops,
    Network,
    Encoders,
    Finance,
    Health,
    General,
}

impl Bucket {
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Security => "security",
            Bucket::Crypto => "crypto",
            Bucket::Dev => "dev",
            Bucket::Electronics => "electronics",
            Bucket::Math => "math",
            Bucket::Physics => "physics",
            Bucket::Chemistry => "chemistry",
            Bucket::Pdf => "pdf",
            Bucket::Video => "video",
            Bucket::Devops => "devops",
            Bucket::Network => "network",
            Bucket::Encoders => "encoders",
            Bucket::Finance => "finance",
            Bucket::Health => "health",
            Bucket::General => "general",
        }
    }

    /// Curated, higher-reach hashtags for the bucket.
    pub fn popular_tags(&self) -> &'static [&'static str] {
        match self {
            Bucket::Security => &["#Cybersecurity", "#InfoSec", "#PKI", "#TLS", "#AppSec"],
            Bucket::Crypto => &["#Crypto", "#Cryptography", "#Encryption"],
            Bucket::Dev => &["#Developers", "#DevTools", "#OpenSource"],
            Bucket::Electronics => &["#Electronics", "#STEM", "#Engineering"],
            Bucket::Math => &["#Math", "#STEM", "#Education"],
            Bucket::Physics => &["#Physics", "#STEM", "#Science"],
            Bucket::Chemistry => &["#Chemistry", "#STEM", "#Science"],
            Bucket::Pdf => &["#PDF", "#Productivity", "#Docs"],
            Bucket::Video => &["#VideoEditing", "#ContentCreation", "#Video"],
            Bucket::Devops => &["#DevOps", "#Kubernetes", "#SRE"],
            Bucket::Network => &["#Networking", "#NetworkEngineering", "#SysAdmin"],
            Bucket::Encoders => &["#Encoding", "#Decoding", "#DataFormats"],
            Bucket::Finance => &["#Finance", "#FinTech", "#Investing"],
            Bucket::Health => &["#HealthTech", "#Healthcare", "#MedTech"],
            Bucket::General => &["#Tech", "#Learn", "#Tools"],
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Evaluated in order; every matching rule contributes its buckets.
const RULES: &[(&[&str], &[Bucket])] = &[
    (
        &["ssl", "tls", "pki", "certificate", "cert", "jwt", "jws", "security", "infosec", "cve"],
        &[Bucket::Security, Bucket::Crypto],
    ),
    (&["crypto", "cryptography", "hash", "aes", "rsa"], &[Bucket::Crypto]),
    (
        &["developer", "tool", "api", "cli", "generator", "calculator"],
        &[Bucket::Dev],
    ),
    (
        &["ohm", "resistor", "circuit", "voltage", "current", "electronics"],
        &[Bucket::Electronics],
    ),
    (
        &["mean", "median", "mode", "probability", "equation", "math", "algebra", "calculus"],
        &[Bucket::Math],
    ),
    (
        &["physics", "mechanics", "projectile", "kinematics", "motion", "energy"],
        &[Bucket::Physics],
    ),
    (
        &["chemistry", "chemical", "stoichiometry", "periodic", "molecule", "reaction"],
        &[Bucket::Chemistry],
    ),
    (
        &["pdf", "document", "merge pdf", "split pdf", "compress pdf", "extract pdf"],
        &[Bucket::Pdf],
    ),
    (
        &["video", "ffmpeg", "codec", "transcode", "edit video", "gif"],
        &[Bucket::Video],
    ),
    (
        &["devops", "docker", "kubernetes", "k8s", "helm", "ci", "cd", "pipeline", "terraform"],
        &[Bucket::Devops],
    ),
    (
        &["network", "ip", "dns", "ping", "traceroute", "whois", "subnet", "cidr"],
        &[Bucket::Network],
    ),
    (
        &["encode", "decoder", "encoding", "base64", "urlencode", "hex", "ascii", "qrcode"],
        &[Bucket::Encoders],
    ),
    (
        &["finance", "loan", "interest", "mortgage", "npv", "roi", "stock", "investment"],
        &[Bucket::Finance],
    ),
    (
        &["health", "bmi", "calorie", "nutrition", "fitness", "heart"],
        &[Bucket::Health],
    ),
];

/// Classify a page into topic buckets by plain substring membership.
pub fn choose_buckets(title: &str, keywords: &str) -> Vec<Bucket> {
    let text = format!("{title} {keywords}").to_lowercase();
    let mut buckets = Vec::new();

    for (needles, targets) in RULES {
        if needles.iter().any(|needle| text.contains(needle)) {
            for bucket in *targets {
                if !buckets.contains(bucket) {
                    buckets.push(*bucket);
                }
            }
        }
    }

    if buckets.is_empty() {
        buckets.push(Bucket::General);
    }
    buckets
}

/// How the LLM hashtag pool is assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashtagStrategy {
    /// Popular bucket tags topped up with keyword-derived tags.
    #[default]
    Auto,
    /// Popular bucket tags only.
    Popular,
    /// Only the explicitly preferred tags.
    Input,
}

impl FromStr for HashtagStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(HashtagStrategy::Auto),
            "popular" => Ok(HashtagStrategy::Popular),
            "input" => Ok(HashtagStrategy::Input),
            other => Err(format!("unknown hashtag strategy: {other}")),
        }
    }
}

impl fmt::Display for HashtagStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashtagStrategy::Auto => "auto",
            HashtagStrategy::Popular => "popular",
            HashtagStrategy::Input => "input",
        };
        f.write_str(name)
    }
}

/// Build the suggested hashtag pool (at most [`MAX_POOL_SIZE`]) for the LLM.
///
/// Explicit tags always win. Otherwise the pool is drawn from the popular
/// tags of the matching buckets and, for [`HashtagStrategy::Auto`], topped up
/// with tags made from the comma separated keywords.
pub fn build_hashtag_pool(
    keywords: &str,
    explicit_tags: &[String],
    title: &str,
    strategy: HashtagStrategy,
) -> Vec<String> {
    let explicit: Vec<String> = explicit_tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    if !explicit.is_empty() {
        return explicit.into_iter().take(MAX_POOL_SIZE).collect();
    }

    let mut tags: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |tag: String, tags: &mut Vec<String>| {
        if seen.insert(tag.to_lowercase()) {
            tags.push(tag);
        }
    };

    if matches!(strategy, HashtagStrategy::Popular | HashtagStrategy::Auto) {
        'buckets: for bucket in choose_buckets(title, keywords) {
            for tag in bucket.popular_tags() {
                push(tag.to_string(), &mut tags);
                if tags.len() >= MAX_POOL_SIZE {
                    break 'buckets;
                }
            }
        }
    }

    if strategy == HashtagStrategy::Auto && tags.len() < MAX_POOL_SIZE {
        for keyword in keywords.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let body: String = keyword.chars().filter(|c| c.is_alphanumeric()).collect();
            if !body.is_empty() {
                push(format!("#{body}"), &mut tags);
            }
            if tags.len() >= MAX_POOL_SIZE {
                break;
            }
        }
    }

    tags.truncate(MAX_POOL_SIZE);
    tags
}
