use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum PromoError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Sitemap not found: {0}")]
    SitemapNotFound(String),

    #[error("Invalid sitemap: {0}")]
    InvalidSitemap(String),

    #[error("No URLs found in sitemap")]
    NoUrls,

    #[error("No URLs remain after applying exclude patterns")]
    AllUrlsExcluded,

    #[error("All {0} remaining URLs failed validation")]
    AllUrlsRejected(usize),

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("Failed to extract metadata: {0}")]
    ExtractError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("External service error: {service} - {message}")]
    ExternalServiceError { service: String, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Not authorized: {0}")]
    AuthError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL scheme not allowed: {0}")]
    InvalidUrlScheme(String),

    #[error("Access to localhost is not allowed")]
    LocalhostBlocked,

    #[error("Access to private IP address is not allowed: {0}")]
    PrivateIpBlocked(String),

    #[error("Domain is blocked: {0}")]
    DomainBlocked(String),

    #[error("Domain is not in the allowed list: {0}")]
    DomainNotAllowed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl PromoError {
    /// Process exit code for errors that end a run.
    pub fn exit_code(&self) -> i32 {
        match self {
            PromoError::SitemapNotFound(_) => 1,
            PromoError::NoUrls => 2,
            PromoError::AllUrlsExcluded | PromoError::AllUrlsRejected(_) => 3,
            PromoError::InvalidSitemap(_) => 4,
            _ => 5,
        }
    }

    pub fn log(&self) {
        match self {
            PromoError::UrlParseError(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            PromoError::SitemapNotFound(location) => {
                error!(location = %location, "Sitemap not found");
            }
            PromoError::InvalidSitemap(e) => {
                error!(error = %e, "Sitemap could not be read");
            }
            PromoError::NoUrls => {
                error!("Sitemap contains no URLs");
            }
            PromoError::AllUrlsExcluded => {
                error!("Every sitemap URL was filtered out");
            }
            PromoError::AllUrlsRejected(count) => {
                error!(
                    rejected = count,
                    "Every remaining URL failed validation; local hosts need allow_local"
                );
            }
            PromoError::FetchError(e) => {
                error!(error = %e, "Content fetch failed");
            }
            PromoError::ExtractError(e) => {
                error!(error = %e, "Metadata extraction failed");
            }
            PromoError::TimeoutError(e) => {
                warn!(error = %e, "Request timed out");
            }
            PromoError::ExternalServiceError { service, message } => {
                error!(
                    service = %service,
                    error = %message,
                    "External service error occurred"
                );
            }
            PromoError::ParseError(e) => {
                warn!(error = %e, "Response parsing failed");
            }
            PromoError::UnsupportedOperation(e) => {
                warn!(error = %e, "Operation not supported");
            }
            PromoError::InvalidConfiguration(e) => {
                warn!(error = %e, "Invalid configuration");
            }
            PromoError::AuthError(e) => {
                warn!(error = %e, "Publishing skipped");
            }
            PromoError::InvalidUrl(_)
            | PromoError::InvalidUrlScheme(_)
            | PromoError::LocalhostBlocked
            | PromoError::PrivateIpBlocked(_)
            | PromoError::DomainBlocked(_)
            | PromoError::DomainNotAllowed(_) => {
                warn!(error = %self, "URL rejected by validation");
            }
            PromoError::IoError(e) => {
                error!(error = %e, "IO operation failed");
            }
            PromoError::SerializationError(e) => {
                error!(error = %e, "Serialization failed");
            }
            PromoError::CsvError(e) => {
                error!(error = %e, "CSV write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_have_distinct_exit_codes() {
        let codes = [
            PromoError::SitemapNotFound("sitemap.xml".into()).exit_code(),
            PromoError::NoUrls.exit_code(),
            PromoError::AllUrlsExcluded.exit_code(),
            PromoError::InvalidSitemap("bad".into()).exit_code(),
        ];
        assert_eq!(codes, [1, 2, 3, 4]);
        assert_eq!(PromoError::FetchError("x".into()).exit_code(), 5);
    }

    #[test]
    fn test_rejected_urls_share_the_excluded_exit_code() {
        let err = PromoError::AllUrlsRejected(2);
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "All 2 remaining URLs failed validation");
    }
}
