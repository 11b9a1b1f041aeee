//! Metric-aggregates queries (POST /metric-aggregates/)

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::KlaviyoClient;
use crate::domain::diagnostic::{Diagnostic, DiagnosticLog};
use crate::domain::error::{AuditError, Result};
use crate::filters::metric_filter;
use crate::parsers::{parse_aggregate, AggregateResult};

/// Aggregation interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Day,
    Week,
    Month,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
        }
    }
}

/// One aggregation query
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    pub metric_id: String,
    /// Canonical start instant string
    pub start: String,
    /// Canonical end instant string
    pub end: String,
    pub measurements: Vec<String>,
    pub interval: Interval,
    /// Optional grouping dimensions (e.g. `$flow`)
    pub by: Vec<String>,
    /// At most one additional filter beyond the datetime bounds
    pub additional_filter: Option<String>,
    pub timezone: String,
}

impl AggregateQuery {
    pub fn new(metric_id: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            metric_id: metric_id.into(),
            start: start.into(),
            end: end.into(),
            measurements: vec!["count".to_string(), "sum_value".to_string(), "unique".to_string()],
            interval: Interval::Day,
            by: Vec::new(),
            additional_filter: None,
            timezone: "UTC".to_string(),
        }
    }

    pub fn measurements(mut self, measurements: &[&str]) -> Self {
        self.measurements = measurements.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn additional_filter(mut self, filter: impl Into<String>) -> Self {
        self.additional_filter = Some(filter.into());
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    fn payload(&self) -> Value {
        let filters = metric_filter(&self.start, &self.end, self.additional_filter.as_deref());
        let mut attributes = json!({
            "metric_id": self.metric_id,
            "measurements": self.measurements,
            "interval": self.interval.as_str(),
            "filter": filters,
            "timezone": self.timezone,
        });
        if !self.by.is_empty() {
            attributes["by"] = json!(self.by);
        }
        json!({
            "data": {
                "type": "metric-aggregate",
                "attributes": attributes,
            }
        })
    }
}

/// Service for time-series aggregation queries.
///
/// A 400 means the metric does not support aggregation at the requested
/// granularity: it is never retried and yields an empty result with a
/// diagnostic rather than an error, so one unsupported metric cannot sink a
/// sub-pipeline.
pub struct MetricAggregatesService {
    client: Arc<KlaviyoClient>,
    diagnostics: DiagnosticLog,
}

impl MetricAggregatesService {
    pub fn new(client: Arc<KlaviyoClient>, diagnostics: DiagnosticLog) -> Self {
        Self { client, diagnostics }
    }

    pub async fn query(&self, query: &AggregateQuery) -> Result<AggregateResult> {
        let payload = query.payload();
        debug!(
            metric_id = %query.metric_id,
            interval = query.interval.as_str(),
            "querying metric aggregates"
        );

        match self.client.post("/metric-aggregates/", &payload).await {
            Ok(response) => {
                let parsed = parse_aggregate(&response);
                if parsed.is_empty() && response.get("data").is_none() {
                    self.diagnostics.push(Diagnostic::parse_incomplete(format!(
                        "metric-aggregates response for {}",
                        query.metric_id
                    )));
                }
                Ok(parsed)
            }
            Err(AuditError::BadRequest { message, .. }) => {
                warn!(
                    metric_id = %query.metric_id,
                    interval = query.interval.as_str(),
                    "metric does not support aggregation here (400): {message}"
                );
                Ok(AggregateResult::default())
            }
            Err(e) if e.is_slice_recoverable() => {
                warn!(metric_id = %query.metric_id, "aggregate query failed: {e}");
                self.diagnostics.push(
                    Diagnostic::parse_incomplete(format!(
                        "aggregate query for {} failed",
                        query.metric_id
                    ))
                    .with_evidence("error", e.to_string()),
                );
                Ok(AggregateResult::default())
            }
            Err(e) => Err(e),
        }
    }
}
