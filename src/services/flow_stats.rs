//! Batched flow statistics via the reporting API
//! (POST /flow-values-reports/)

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::json;
use tracing::debug;

use crate::client::KlaviyoClient;
use crate::domain::error::{AuditError, Result};
use crate::filters::reporting_filter;
use crate::parsers::{parse_report_rows, ReportRow};

use super::metrics::MetricsService;

/// Statistics requested when the caller does not specify a set
pub const DEFAULT_FLOW_STATISTICS: &[&str] = &[
    "opens",
    "open_rate",
    "clicks",
    "click_rate",
    "bounce_rate",
    "recipients",
    "delivery_rate",
    "unsubscribe_rate",
];

/// Bound on the response cache
const CACHE_CAPACITY: usize = 50;

type CacheKey = (Vec<String>, String, Vec<String>, String);

#[derive(Default)]
struct ResponseCache {
    entries: HashMap<CacheKey, Vec<ReportRow>>,
    order: VecDeque<CacheKey>,
}

impl ResponseCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<ReportRow>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: CacheKey, rows: Vec<ReportRow>) {
        if self.entries.insert(key.clone(), rows).is_none() {
            self.order.push_back(key);
            if self.order.len() > CACHE_CAPACITY {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
    }
}

/// Service for the flow reporting endpoint.
///
/// Repeated batched queries inside one audit run hit an in-memory cache
/// keyed by (sorted ids, timeframe, sorted statistics, conversion metric),
/// FIFO-bounded at 50 entries. The conversion metric is resolved from the
/// ordered candidate list when the caller does not supply one.
pub struct FlowStatisticsService {
    client: Arc<KlaviyoClient>,
    metrics: Arc<MetricsService>,
    cache: Mutex<ResponseCache>,
}

impl FlowStatisticsService {
    pub fn new(client: Arc<KlaviyoClient>, metrics: Arc<MetricsService>) -> Self {
        Self {
            client,
            metrics,
            cache: Mutex::new(ResponseCache::default()),
        }
    }

    /// Statistics for up to 100 flow ids in one call. Rows are per flow
    /// message; callers aggregate by `flow_id` grouping.
    pub async fn get_statistics(
        &self,
        flow_ids: &[String],
        statistics: Option<&[&str]>,
        timeframe: &str,
        conversion_metric_id: Option<&str>,
    ) -> Result<Vec<ReportRow>> {
        if flow_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conversion_metric_id = match conversion_metric_id {
            Some(id) => {
                self.metrics.set_conversion_metric(id).await;
                id.to_string()
            }
            None => self
                .metrics
                .resolve_conversion_metric()
                .await?
                .ok_or(AuditError::MissingConversionMetric)?,
        };

        let statistics: Vec<&str> = statistics
            .map(|s| s.to_vec())
            .unwrap_or_else(|| DEFAULT_FLOW_STATISTICS.to_vec());

        let key = cache_key(flow_ids, timeframe, &statistics, &conversion_metric_id);
        if let Some(cached) = self.cache.lock().expect("cache lock poisoned").get(&key) {
            debug!(flows = flow_ids.len(), "using cached flow statistics");
            return Ok(cached);
        }

        let payload = json!({
            "data": {
                "type": "flow-values-report",
                "attributes": {
                    "statistics": statistics,
                    "timeframe": {"key": timeframe},
                    "filter": reporting_filter(flow_ids, "flow_id"),
                    "conversion_metric_id": conversion_metric_id,
                }
            }
        });

        debug!(flows = flow_ids.len(), timeframe, "querying flow statistics");
        let response = self.client.post("/flow-values-reports/", &payload).await?;
        let rows = parse_report_rows(&response);

        self.cache
            .lock()
            .expect("cache lock poisoned")
            .insert(key, rows.clone());
        Ok(rows)
    }
}

fn cache_key(
    flow_ids: &[String],
    timeframe: &str,
    statistics: &[&str],
    conversion_metric_id: &str,
) -> CacheKey {
    let mut ids: Vec<String> = flow_ids.to_vec();
    ids.sort();
    let mut stats: Vec<String> = statistics.iter().map(|s| s.to_string()).collect();
    stats.sort();
    (ids, timeframe.to_string(), stats, conversion_metric_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_order_insensitive() {
        let a = cache_key(
            &["F2".to_string(), "F1".to_string()],
            "last_30_days",
            &["opens", "clicks"],
            "M1",
        );
        let b = cache_key(
            &["F1".to_string(), "F2".to_string()],
            "last_30_days",
            &["clicks", "opens"],
            "M1",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_fifo_eviction() {
        let mut cache = ResponseCache::default();
        for i in 0..(CACHE_CAPACITY + 5) {
            let key = cache_key(&[format!("F{i}")], "last_30_days", &["opens"], "M1");
            cache.insert(key, Vec::new());
        }
        assert_eq!(cache.entries.len(), CACHE_CAPACITY);

        // The first-inserted keys are the ones evicted
        let first = cache_key(&["F0".to_string()], "last_30_days", &["opens"], "M1");
        assert!(cache.get(&first).is_none());
        let last = cache_key(
            &[format!("F{}", CACHE_CAPACITY + 4)],
            "last_30_days",
            &["opens"],
            "M1",
        );
        assert!(cache.get(&last).is_some());
    }
}
