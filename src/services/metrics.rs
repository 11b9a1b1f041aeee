//! Metric listing and name resolution

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::KlaviyoClient;
use crate::domain::entities::MetricRef;
use crate::domain::error::Result;

/// Integration preferred when several metrics share a name; the dashboard
/// reports against the e-commerce integration's metric, so the audit must
/// match it.
pub const PREFERRED_INTEGRATION: &str = "shopify";

/// Conversion metric candidates in resolution order
pub const CONVERSION_METRIC_CANDIDATES: &[&str] = &[
    "Ordered Product",
    "Placed Order",
    "Purchase",
    "Completed Order",
    "Order",
    "Checkout",
];

/// Service for the metrics resource family. Memoizes the last resolved
/// conversion metric id so batched statistics never repeat the lookup.
pub struct MetricsService {
    client: Arc<KlaviyoClient>,
    conversion_metric: Mutex<Option<String>>,
}

impl MetricsService {
    pub fn new(client: Arc<KlaviyoClient>) -> Self {
        Self {
            client,
            conversion_metric: Mutex::new(None),
        }
    }

    /// All metrics in the account
    pub async fn get_metrics(&self) -> Result<Vec<MetricRef>> {
        let response = self.client.get("/metrics/", None).await?;
        Ok(parse_metrics(&response))
    }

    /// Resolve a metric by exact name. When several share the name the
    /// preferred integration wins; otherwise the first match is returned
    /// with a warning.
    pub async fn get_metric_by_name(
        &self,
        name: &str,
        prefer_integration: Option<&str>,
    ) -> Result<Option<MetricRef>> {
        let metrics = self.get_metrics().await?;
        Ok(select_by_name(&metrics, name, prefer_integration))
    }

    /// Resolve the conversion metric the reporting API requires, walking
    /// the ordered candidate list with the e-commerce integration
    /// preference. The result is memoized.
    pub async fn resolve_conversion_metric(&self) -> Result<Option<String>> {
        if let Some(cached) = self.conversion_metric.lock().await.clone() {
            debug!(metric_id = %cached, "using cached conversion metric");
            return Ok(Some(cached));
        }

        let metrics = self.get_metrics().await?;
        for candidate in CONVERSION_METRIC_CANDIDATES {
            if let Some(metric) = select_by_name(&metrics, candidate, Some(PREFERRED_INTEGRATION)) {
                info!(
                    name = candidate,
                    metric_id = %metric.id,
                    integration = metric.integration_name.as_deref().unwrap_or("none"),
                    "resolved conversion metric"
                );
                *self.conversion_metric.lock().await = Some(metric.id.clone());
                return Ok(Some(metric.id));
            }
        }

        warn!("no conversion metric could be resolved from candidate names");
        Ok(None)
    }

    /// Resolve "Placed Order" preferring the e-commerce integration; this is
    /// the metric the reporting API's attribution is keyed on.
    pub async fn resolve_placed_order(&self) -> Result<Option<MetricRef>> {
        let metrics = self.get_metrics().await?;
        Ok(select_by_name(&metrics, "Placed Order", Some(PREFERRED_INTEGRATION)))
    }

    /// Record an externally supplied conversion metric id
    pub async fn set_conversion_metric(&self, metric_id: impl Into<String>) {
        *self.conversion_metric.lock().await = Some(metric_id.into());
    }
}

fn parse_metrics(response: &Value) -> Vec<MetricRef> {
    let Some(items) = response.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?.to_string();
            let attrs = item.get("attributes")?;
            let name = attrs.get("name")?.as_str()?.to_string();
            let integration = attrs.get("integration");
            Some(MetricRef {
                id,
                name,
                integration_key: integration
                    .and_then(|i| i.get("key"))
                    .and_then(Value::as_str)
                    .map(|s| s.to_ascii_lowercase()),
                integration_name: integration
                    .and_then(|i| i.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

fn select_by_name(
    metrics: &[MetricRef],
    name: &str,
    prefer_integration: Option<&str>,
) -> Option<MetricRef> {
    let matches: Vec<&MetricRef> = metrics.iter().filter(|m| m.name == name).collect();

    match matches.len() {
        0 => None,
        1 => Some(matches[0].clone()),
        _ => {
            if let Some(preferred) = prefer_integration {
                let preferred = preferred.to_ascii_lowercase();
                if let Some(hit) = matches
                    .iter()
                    .find(|m| m.integration_key.as_deref() == Some(preferred.as_str()))
                {
                    return Some((*hit).clone());
                }
            }
            warn!(
                name,
                count = matches.len(),
                chosen = %matches[0].id,
                "multiple metrics share a name, using first match"
            );
            Some(matches[0].clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_metrics() -> Vec<MetricRef> {
        parse_metrics(&json!({
            "data": [
                {"id": "M1", "attributes": {"name": "Placed Order", "integration": {"key": "api", "name": "API"}}},
                {"id": "M2", "attributes": {"name": "Placed Order", "integration": {"key": "shopify", "name": "Shopify"}}},
                {"id": "M3", "attributes": {"name": "Viewed Product", "integration": {"key": "shopify", "name": "Shopify"}}}
            ]
        }))
    }

    #[test]
    fn test_parse_metrics() {
        let metrics = sample_metrics();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[1].integration_key.as_deref(), Some("shopify"));
    }

    #[test]
    fn test_integration_preference_wins() {
        let metrics = sample_metrics();
        let hit = select_by_name(&metrics, "Placed Order", Some("shopify")).unwrap();
        assert_eq!(hit.id, "M2");
    }

    #[test]
    fn test_first_match_without_preference() {
        let metrics = sample_metrics();
        let hit = select_by_name(&metrics, "Placed Order", None).unwrap();
        assert_eq!(hit.id, "M1");
    }

    #[test]
    fn test_no_match() {
        let metrics = sample_metrics();
        assert!(select_by_name(&metrics, "Ordered Product", None).is_none());
    }
}
