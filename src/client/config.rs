//! Client configuration with builder pattern

use std::time::Duration;

use url::Url;

use crate::domain::error::{AuditError, Result};

/// Default provider base URL
pub const DEFAULT_BASE_URL: &str = "https://a.klaviyo.com/api";

/// API revision sent on every request
pub const API_REVISION: &str = "2025-10-15";

/// Provider rate tier. Effective limits are 80% of the published ceilings
/// to leave headroom for other consumers of the same account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateTier {
    Small,
    #[default]
    Medium,
    Large,
    Xl,
}

impl RateTier {
    /// Published provider ceilings (requests/second, requests/minute)
    pub fn published(&self) -> (f64, u32) {
        match self {
            RateTier::Small => (3.0, 60),
            RateTier::Medium => (10.0, 150),
            RateTier::Large => (75.0, 700),
            RateTier::Xl => (350.0, 3500),
        }
    }

    /// Effective limits: 80% of the published ceilings
    pub fn effective(&self) -> (f64, u32) {
        match self {
            RateTier::Small => (2.4, 48),
            RateTier::Medium => (8.0, 120),
            RateTier::Large => (60.0, 560),
            RateTier::Xl => (280.0, 2800),
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "small" => RateTier::Small,
            "large" => RateTier::Large,
            "xl" => RateTier::Xl,
            _ => RateTier::Medium,
        }
    }
}

/// Configuration for [`crate::client::KlaviyoClient`]
#[derive(Clone)]
pub struct ClientConfig {
    /// API key; read once at construction, never logged
    pub api_key: String,
    pub base_url: Url,
    pub rate_tier: RateTier,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry ceiling for 429/5xx
    pub max_retries: usize,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("rate_tier", &self.rate_tier)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            rate_tier: RateTier::Medium,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(AuditError::config("API key must not be empty"));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`]
#[derive(Default)]
pub struct ClientConfigBuilder {
    api_key: Option<String>,
    base_url: Option<Url>,
    rate_tier: Option<RateTier>,
    timeout: Option<Duration>,
    max_retries: Option<usize>,
}

impl ClientConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let parsed = Url::parse(url.as_ref())
            .map_err(|e| AuditError::config(format!("invalid base URL: {e}")))?;
        self.base_url = Some(parsed);
        Ok(self)
    }

    pub fn rate_tier(mut self, tier: RateTier) -> Self {
        self.rate_tier = Some(tier);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let api_key = self
            .api_key
            .ok_or_else(|| AuditError::config("API key is required"))?;
        let mut config = ClientConfig::new(api_key);
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(tier) = self.rate_tier {
            config.rate_tier = tier;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_limits() {
        assert_eq!(RateTier::Small.effective(), (2.4, 48));
        assert_eq!(RateTier::Medium.effective(), (8.0, 120));
        assert_eq!(RateTier::Large.effective(), (60.0, 560));
        assert_eq!(RateTier::Xl.effective(), (280.0, 2800));

        // Effective limits are 80% of published
        for tier in [RateTier::Small, RateTier::Medium, RateTier::Large, RateTier::Xl] {
            let (pub_rps, pub_rpm) = tier.published();
            let (eff_rps, eff_rpm) = tier.effective();
            assert!((eff_rps - pub_rps * 0.8).abs() < 1e-9);
            assert_eq!(eff_rpm, (pub_rpm as f64 * 0.8) as u32);
        }
    }

    #[test]
    fn test_builder_requires_api_key() {
        assert!(ClientConfig::builder().build().is_err());

        let config = ClientConfig::builder()
            .api_key("pk_test")
            .rate_tier(RateTier::Large)
            .build()
            .unwrap();
        assert_eq!(config.rate_tier, RateTier::Large);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ClientConfig::new("pk_super_secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("pk_super_secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(RateTier::parse("XL"), RateTier::Xl);
        assert_eq!(RateTier::parse("unknown"), RateTier::Medium);
    }
}
