use crate::error::PromoError;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;
use url::Url;

/// Policy applied to sitemap URLs before any of them is opened
#[derive(Debug, Clone)]
pub struct UrlValidationConfig {
    /// Allowed URL schemes (default: ["http", "https"])
    pub allowed_schemes: HashSet<String>,
    /// Block private/local IP addresses (default: true)
    pub block_private_ips: bool,
    /// Block localhost addresses (default: true)
    pub block_localhost: bool,
    /// Domain blacklist
    pub blocked_domains: HashSet<String>,
    /// Domain whitelist (if not empty, only these domains are allowed)
    pub allowed_domains: HashSet<String>,
}

impl Default for UrlValidationConfig {
    fn default() -> Self {
        let allowed_schemes = ["http", "https"].iter().map(|s| s.to_string()).collect();

        Self {
            allowed_schemes,
            block_private_ips: true,
            block_localhost: true,
            blocked_domains: HashSet::new(),
            allowed_domains: HashSet::new(),
        }
    }
}

impl UrlValidationConfig {
    /// Permit localhost and private addresses, for promoting a site served locally.
    pub fn allow_local(mut self) -> Self {
        self.block_private_ips = false;
        self.block_localhost = false;
        self
    }

    pub fn with_blocked_domain(mut self, domain: impl Into<String>) -> Self {
        self.blocked_domains.insert(domain.into().to_lowercase());
        self
    }

    pub fn with_allowed_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domains.insert(domain.into().to_lowercase());
        self
    }
}

#[derive(Debug, Clone)]
pub struct UrlValidator {
    config: UrlValidationConfig,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::with_default_config()
    }
}

impl UrlValidator {
    pub fn new(config: UrlValidationConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(UrlValidationConfig::default())
    }

    pub fn validate(&self, url_str: &str) -> Result<Url, PromoError> {
        let url = Url::parse(url_str)?;

        if !self.config.allowed_schemes.contains(url.scheme()) {
            return Err(PromoError::InvalidUrlScheme(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| PromoError::InvalidUrl(format!("no host in {url_str}")))?;

        if !self.config.allowed_domains.is_empty() {
            if !self.is_domain_allowed(host) {
                return Err(PromoError::DomainNotAllowed(host.to_string()));
            }
        } else if self.is_domain_blocked(host) {
            return Err(PromoError::DomainBlocked(host.to_string()));
        }

        if self.config.block_localhost && is_localhost(host) {
            return Err(PromoError::LocalhostBlocked);
        }

        if self.config.block_private_ips {
            // IPv6 hosts come back wrapped in brackets
            let ip_str = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);

            if let Ok(ip) = ip_str.parse::<IpAddr>() {
                if is_private_ip(&ip) {
                    return Err(PromoError::PrivateIpBlocked(ip.to_string()));
                }
            }
        }

        Ok(url)
    }

    /// Keep only the URLs that pass validation, logging each one dropped.
    pub fn retain_valid(&self, urls: Vec<String>) -> Vec<String> {
        urls.into_iter()
            .filter(|url| match self.validate(url) {
                Ok(_) => true,
                Err(e) => {
                    warn!(url = %url, error = %e, "Dropping sitemap URL");
                    false
                }
            })
            .collect()
    }

    fn is_domain_allowed(&self, host: &str) -> bool {
        self.config
            .allowed_domains
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }

    fn is_domain_blocked(&self, host: &str) -> bool {
        self.config
            .blocked_domains
            .iter()
            .any(|blocked| host == blocked || host.ends_with(&format!(".{blocked}")))
    }
}

fn is_localhost(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_unspecified()
                || is_ipv4_reserved(ipv4)
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // fe80::/10
                || (ipv6.segments()[0] & 0xffc0) == 0xfe80
                // fc00::/7
                || (ipv6.segments()[0] & 0xfe00) == 0xfc00
        }
    }
}

fn is_ipv4_reserved(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();

    // 0.0.0.0/8
    octets[0] == 0
        // 100.64.0.0/10 (Carrier-grade NAT)
        || (octets[0] == 100 && (octets[1] & 0b11000000) == 0b01000000)
        // 224.0.0.0/4 (Multicast)
        || (octets[0] & 0b11110000) == 0b11100000
        // 240.0.0.0/4 (Reserved)
        || (octets[0] & 0b11110000) == 0b11110000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validator_schemes() {
        let validator = UrlValidator::with_default_config();

        assert!(validator.validate("https://example.com/tools/ohm").is_ok());
        assert!(validator.validate("http://example.com").is_ok());
        assert!(matches!(
            validator.validate("ftp://example.com"),
            Err(PromoError::InvalidUrlScheme(_))
        ));
        assert!(validator.validate("file:///etc/passwd").is_err());
        assert!(matches!(
            validator.validate("not a url"),
            Err(PromoError::UrlParseError(_))
        ));
    }

    #[test]
    fn test_url_validator_localhost() {
        let validator = UrlValidator::with_default_config();

        assert!(matches!(
            validator.validate("http://localhost:8000/"),
            Err(PromoError::LocalhostBlocked)
        ));
        assert!(validator.validate("http://127.0.0.1").is_err());
        assert!(validator.validate("http://[::1]").is_err());
    }

    #[test]
    fn test_url_validator_private_ips() {
        let validator = UrlValidator::with_default_config();

        assert!(validator.validate("http://10.0.0.1").is_err());
        assert!(validator.validate("http://192.168.1.1").is_err());
        assert!(validator.validate("http://172.16.0.1").is_err());
        assert!(validator.validate("http://169.254.1.1").is_err());
        assert!(validator.validate("http://100.64.0.1").is_err());
        assert!(validator.validate("http://[fd00::1]").is_err());
        assert!(validator.validate("http://93.184.216.34").is_ok());
    }

    #[test]
    fn test_allow_local() {
        let validator = UrlValidator::new(UrlValidationConfig::default().allow_local());

        assert!(validator.validate("http://localhost:8000/").is_ok());
        assert!(validator.validate("http://192.168.1.1/").is_ok());
    }

    #[test]
    fn test_url_validator_domain_lists() {
        let validator =
            UrlValidator::new(UrlValidationConfig::default().with_blocked_domain("evil.com"));

        assert!(validator.validate("http://evil.com").is_err());
        assert!(validator.validate("http://sub.evil.com").is_err());
        assert!(validator.validate("http://good.com").is_ok());
    }

    #[test]
    fn test_url_validator_whitelist() {
        let validator =
            UrlValidator::new(UrlValidationConfig::default().with_allowed_domain("trusted.com"));

        assert!(validator.validate("http://trusted.com").is_ok());
        assert!(validator.validate("http://sub.trusted.com").is_ok());
        assert!(matches!(
            validator.validate("http://untrusted.com"),
            Err(PromoError::DomainNotAllowed(_))
        ));
    }

    #[test]
    fn test_retain_valid_keeps_order() {
        let validator = UrlValidator::with_default_config();
        let kept = validator.retain_valid(vec![
            "https://example.com/b".to_string(),
            "javascript:alert(1)".to_string(),
            "http://localhost/".to_string(),
            "https://example.com/a".to_string(),
        ]);
        assert_eq!(kept, vec!["https://example.com/b", "https://example.com/a"]);
    }
}
