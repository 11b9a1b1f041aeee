//! Account metadata service

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::KlaviyoClient;
use crate::domain::account::AccountContext;
use crate::domain::error::Result;

/// Fetches account settings (currency, timezone, organization, industry).
///
/// The first successful read is memoized for the process lifetime; readers
/// may race on first population but the fetch is idempotent.
pub struct AccountService {
    client: Arc<KlaviyoClient>,
    cache: Mutex<Option<AccountContext>>,
}

impl AccountService {
    pub fn new(client: Arc<KlaviyoClient>) -> Self {
        Self {
            client,
            cache: Mutex::new(None),
        }
    }

    /// Account context with defaults for missing fields: currency USD,
    /// timezone UTC.
    pub async fn get_context(&self) -> Result<AccountContext> {
        if let Some(cached) = self.cache.lock().await.clone() {
            return Ok(cached);
        }

        let response = self.client.get("/accounts/", None).await?;
        let context = parse_account(&response);
        debug!(
            currency = %context.currency,
            timezone = %context.timezone,
            "account context loaded"
        );

        *self.cache.lock().await = Some(context.clone());
        Ok(context)
    }
}

fn parse_account(response: &Value) -> AccountContext {
    let attrs = response
        .get("data")
        .and_then(Value::as_array)
        .and_then(|accounts| accounts.first())
        .and_then(|account| account.get("attributes"));

    let Some(attrs) = attrs else {
        tracing::warn!("no account data in response, using defaults");
        return AccountContext::default();
    };

    let text = |value: Option<&Value>, default: &str| {
        value
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    AccountContext {
        currency: text(attrs.get("preferred_currency"), "USD"),
        timezone: text(attrs.get("timezone"), "UTC"),
        organization_name: text(
            attrs
                .get("contact_information")
                .and_then(|c| c.get("organization_name")),
            "",
        ),
        industry: text(attrs.get("industry"), ""),
        locale: text(attrs.get("locale"), "en-US"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_account_defaults() {
        let context = parse_account(&json!({"data": []}));
        assert_eq!(context.currency, "USD");
        assert_eq!(context.timezone, "UTC");
    }

    #[test]
    fn test_parse_account_fields() {
        let response = json!({
            "data": [{
                "attributes": {
                    "preferred_currency": "AUD",
                    "timezone": "Australia/Sydney",
                    "industry": "Apparel and Accessories",
                    "contact_information": {"organization_name": "Driftwood Supply"}
                }
            }]
        });

        let context = parse_account(&response);
        assert_eq!(context.currency, "AUD");
        assert_eq!(context.timezone, "Australia/Sydney");
        assert_eq!(context.organization_name, "Driftwood Supply");
        assert_eq!(context.locale, "en-US");
    }
}
