//! Account context shared by the aggregator, diagnostics, and presenters

use serde::{Deserialize, Serialize};

/// Account-level settings that shape the audit: currency for monetary
/// values, timezone for window calculation, industry for benchmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountContext {
    /// ISO currency code, e.g. "AUD". No FX conversion is ever performed.
    pub currency: String,
    /// IANA timezone name, e.g. "Australia/Sydney"
    pub timezone: String,
    pub organization_name: String,
    /// Benchmark industry key, e.g. "apparel_accessories"
    pub industry: String,
    pub locale: String,
}

impl Default for AccountContext {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            timezone: "UTC".to_string(),
            organization_name: String::new(),
            industry: String::new(),
            locale: "en-US".to_string(),
        }
    }
}
