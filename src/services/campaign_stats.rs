//! Batched campaign statistics via the reporting API
//! (POST /campaign-values-reports/)

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::client::KlaviyoClient;
use crate::domain::error::{AuditError, Result};
use crate::filters::reporting_filter;
use crate::parsers::{parse_report_rows, ReportRow};

use super::metrics::MetricsService;

/// Statistics requested when the caller does not specify a set
pub const DEFAULT_CAMPAIGN_STATISTICS: &[&str] = &[
    "opens",
    "open_rate",
    "clicks",
    "click_rate",
    "bounce_rate",
    "recipients",
    "delivery_rate",
    "unsubscribe_rate",
    "spam_complaint_rate",
    "conversions",
    "conversion_rate",
];

/// Service for the campaign reporting endpoint. The endpoint requires a
/// conversion metric; when the caller does not provide one it is resolved
/// as "Placed Order" with the e-commerce integration preference.
pub struct CampaignStatisticsService {
    client: Arc<KlaviyoClient>,
    metrics: Arc<MetricsService>,
}

impl CampaignStatisticsService {
    pub fn new(client: Arc<KlaviyoClient>, metrics: Arc<MetricsService>) -> Self {
        Self { client, metrics }
    }

    /// Statistics for up to 100 campaign ids in one call
    pub async fn get_statistics(
        &self,
        campaign_ids: &[String],
        statistics: Option<&[&str]>,
        timeframe: &str,
        conversion_metric_id: Option<&str>,
    ) -> Result<Vec<ReportRow>> {
        if campaign_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conversion_metric_id = match conversion_metric_id {
            Some(id) => id.to_string(),
            None => {
                let placed_order = self.metrics.resolve_placed_order().await?;
                match placed_order {
                    Some(metric) => {
                        self.metrics.set_conversion_metric(&metric.id).await;
                        metric.id
                    }
                    None => return Err(AuditError::MissingConversionMetric),
                }
            }
        };

        let statistics: Vec<&str> = statistics
            .map(|s| s.to_vec())
            .unwrap_or_else(|| DEFAULT_CAMPAIGN_STATISTICS.to_vec());

        let payload = json!({
            "data": {
                "type": "campaign-values-report",
                "attributes": {
                    "statistics": statistics,
                    "timeframe": {"key": timeframe},
                    "filter": reporting_filter(campaign_ids, "campaign_id"),
                    "conversion_metric_id": conversion_metric_id,
                }
            }
        });

        debug!(
            campaigns = campaign_ids.len(),
            timeframe, "querying campaign statistics"
        );
        let response = self.client.post("/campaign-values-reports/", &payload).await?;
        Ok(parse_report_rows(&response))
    }
}
