//! Canonicalization of the provider's heterogeneous payload shapes
//!
//! The aggregation endpoint returns measurements as plain numbers, as
//! `[sum, count, unique]` triples, as per-interval dicts, or as a single
//! aggregated dict; the reporting endpoint returns per-entity rows whose
//! rates may be decimal or percent. Everything is reduced here to
//! [`AggregateResult`] and [`ReportRow`] so no downstream code ever
//! discriminates on JSON shape.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::statistics::{canonical_rate, EntityStatistics};

/// Parsed aggregation response: parallel date and measurement series.
///
/// Every measurement series has the same length as `dates`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    pub dates: Vec<String>,
    pub measurements: HashMap<String, Vec<f64>>,
}

impl AggregateResult {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.measurements.values().all(|series| series.is_empty())
    }

    /// Measurement series by name; empty slice when absent
    pub fn series(&self, measurement: &str) -> &[f64] {
        self.measurements
            .get(measurement)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sum(&self, measurement: &str) -> f64 {
        self.series(measurement).iter().sum()
    }
}

/// One row of a reporting-API response
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub groupings: HashMap<String, String>,
    pub statistics: EntityStatistics,
}

impl ReportRow {
    pub fn group(&self, key: &str) -> Option<&str> {
        self.groupings.get(key).map(String::as_str)
    }
}

/// Parse a single metric value from any of the provider's encodings:
/// scalar, string-encoded scalar, `[sum, count, unique]` list, or
/// `{sum_value, count, value}` dict. Unparseable values become 0.
pub fn metric_value(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Array(items) => items.first().map(metric_value).unwrap_or(0.0),
        Value::Object(map) => {
            for key in ["sum_value", "count", "value"] {
                if let Some(inner) = map.get(key) {
                    if !inner.is_null() {
                        return metric_value(inner);
                    }
                }
            }
            0.0
        }
        Value::Bool(_) => 0.0,
    }
}

/// Parse one index of a list-encoded measurement (0 = sum, 1 = count,
/// 2 = unique); non-list values fall back to [`metric_value`].
pub fn metric_list_value(value: &Value, index: usize) -> f64 {
    match value {
        Value::Array(items) => items.get(index).map(metric_value).unwrap_or(0.0),
        other => metric_value(other),
    }
}

/// Reduce a metric-aggregates response to parallel series.
///
/// Malformed payloads produce an empty result; the caller decides whether
/// that warrants a `ParseIncomplete` diagnostic.
pub fn parse_aggregate(response: &Value) -> AggregateResult {
    let Some(attrs) = response.get("data").and_then(|d| d.get("attributes")) else {
        return AggregateResult::default();
    };

    let dates: Vec<String> = attrs
        .get("dates")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let Some(rows) = attrs.get("data").and_then(Value::as_array) else {
        return AggregateResult { dates, measurements: HashMap::new() };
    };

    let mut measurements: HashMap<String, Vec<f64>> = HashMap::new();

    let dict_rows: Vec<&serde_json::Map<String, Value>> =
        rows.iter().filter_map(Value::as_object).collect();

    if !dict_rows.is_empty() && dict_rows.len() == rows.len() {
        if dict_rows.len() == 1 && dict_rows[0].contains_key("measurements") {
            // Aggregated-single form: one row whose measurements hold the
            // full per-interval series
            if let Some(inner) = dict_rows[0].get("measurements").and_then(Value::as_object) {
                for (key, series) in inner {
                    let parsed = match series {
                        Value::Array(items) => items.iter().map(metric_value).collect(),
                        other => vec![metric_value(other)],
                    };
                    measurements.insert(key.clone(), parsed);
                }
            }
        } else {
            // Per-interval rows, each carrying a measurements dict with a
            // scalar (or single-element list) per key
            for row in &dict_rows {
                if let Some(inner) = row.get("measurements").and_then(Value::as_object) {
                    for (key, entry) in inner {
                        measurements
                            .entry(key.clone())
                            .or_default()
                            .push(metric_value(entry));
                    }
                }
            }
        }
    } else if rows.iter().all(|row| row.is_array()) {
        // List-encoded rows: [sum_value, count, unique]
        for (index, key) in ["sum_value", "count", "unique"].iter().enumerate() {
            let series: Vec<f64> = rows.iter().map(|row| metric_list_value(row, index)).collect();
            if series.iter().any(|v| *v != 0.0) || index == 0 {
                measurements.insert((*key).to_string(), series);
            }
        }
    } else {
        // Plain per-interval scalars
        measurements.insert("value".to_string(), rows.iter().map(metric_value).collect());
    }

    AggregateResult { dates, measurements }
}

/// Sum one measurement of a grouped aggregation response keyed by a
/// grouping value (e.g. flow revenue grouped by `flow_id`).
pub fn parse_grouped_sums(
    response: &Value,
    grouping_key: &str,
    measurement: &str,
) -> HashMap<String, f64> {
    let mut sums = HashMap::new();
    let Some(rows) = response
        .get("data")
        .and_then(|d| d.get("attributes"))
        .and_then(|a| a.get("data"))
        .and_then(Value::as_array)
    else {
        return sums;
    };

    for row in rows {
        let Some(group) = row
            .get("groupings")
            .and_then(|g| g.get(grouping_key))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let total = row
            .get("measurements")
            .and_then(|m| m.get(measurement))
            .map(|series| match series {
                Value::Array(items) => items.iter().map(metric_value).sum(),
                other => metric_value(other),
            })
            .unwrap_or(0.0);
        *sums.entry(group.to_string()).or_insert(0.0) += total;
    }
    sums
}

/// Extract and canonicalize the rows of a reporting-API response.
///
/// Rates arriving as decimals are scaled to percent; counts are coerced to
/// integers; missing fields become zero.
pub fn parse_report_rows(response: &Value) -> Vec<ReportRow> {
    let Some(results) = response
        .get("data")
        .and_then(|d| d.get("attributes"))
        .and_then(|a| a.get("results"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|result| {
            let statistics = result.get("statistics")?.as_object()?;
            let groupings = result
                .get("groupings")
                .and_then(Value::as_object)
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            Some(ReportRow {
                groupings,
                statistics: canonical_statistics(statistics),
            })
        })
        .collect()
}

fn count(statistics: &serde_json::Map<String, Value>, key: &str) -> u64 {
    statistics
        .get(key)
        .map(metric_value)
        .unwrap_or(0.0)
        .max(0.0)
        .round() as u64
}

fn rate(statistics: &serde_json::Map<String, Value>, key: &str) -> f64 {
    let raw = statistics.get(key).map(metric_value).unwrap_or(0.0);
    if raw == 0.0 {
        0.0
    } else {
        canonical_rate(raw)
    }
}

fn canonical_statistics(statistics: &serde_json::Map<String, Value>) -> EntityStatistics {
    EntityStatistics {
        recipients: count(statistics, "recipients"),
        opens: count(statistics, "opens"),
        open_rate: rate(statistics, "open_rate"),
        clicks: count(statistics, "clicks"),
        click_rate: rate(statistics, "click_rate"),
        conversions: count(statistics, "conversions"),
        conversion_rate: rate(statistics, "conversion_rate"),
        conversion_value: statistics
            .get("conversion_value")
            .map(metric_value)
            .unwrap_or(0.0),
        bounce_rate: rate(statistics, "bounce_rate"),
        unsubscribe_rate: rate(statistics, "unsubscribe_rate"),
        spam_complaint_rate: rate(statistics, "spam_complaint_rate"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_metric_value_shapes() {
        assert_eq!(metric_value(&json!(12.5)), 12.5);
        assert_eq!(metric_value(&json!("3.5")), 3.5);
        assert_eq!(metric_value(&json!(" ")), 0.0);
        assert_eq!(metric_value(&json!(null)), 0.0);
        assert_eq!(metric_value(&json!([42.0, 7, 3])), 42.0);
        assert_eq!(metric_value(&json!({"sum_value": 99.0, "count": 2})), 99.0);
        assert_eq!(metric_value(&json!({"count": "17"})), 17.0);
        assert_eq!(metric_value(&json!({"unrelated": 5})), 0.0);
    }

    #[test]
    fn test_metric_list_value() {
        let value = json!([100.0, 25, 10]);
        assert_eq!(metric_list_value(&value, 0), 100.0);
        assert_eq!(metric_list_value(&value, 1), 25.0);
        assert_eq!(metric_list_value(&value, 5), 0.0);
    }

    #[test]
    fn test_parse_aggregated_single() {
        let response = json!({
            "data": {
                "attributes": {
                    "dates": ["2025-09-01T00:00:00Z", "2025-10-01T00:00:00Z"],
                    "data": [{"measurements": {"sum_value": [100.0, 200.0], "count": [2, 4]}}]
                }
            }
        });

        let result = parse_aggregate(&response);
        assert_eq!(result.dates.len(), 2);
        assert_eq!(result.series("sum_value"), &[100.0, 200.0]);
        assert_eq!(result.sum("count"), 6.0);
    }

    #[test]
    fn test_parse_per_interval_rows() {
        let response = json!({
            "data": {
                "attributes": {
                    "dates": ["2025-09-01T00:00:00Z", "2025-09-02T00:00:00Z"],
                    "data": [
                        {"measurements": {"sum_value": [50.0], "count": 1}},
                        {"measurements": {"sum_value": [75.0], "count": 2}}
                    ]
                }
            }
        });

        let result = parse_aggregate(&response);
        assert_eq!(result.series("sum_value"), &[50.0, 75.0]);
        assert_eq!(result.series("count"), &[1.0, 2.0]);
    }

    #[test]
    fn test_parse_list_encoded_rows() {
        let response = json!({
            "data": {
                "attributes": {
                    "dates": ["2025-09-01T00:00:00Z", "2025-09-02T00:00:00Z"],
                    "data": [[10.0, 1, 1], [20.0, 2, 2]]
                }
            }
        });

        let result = parse_aggregate(&response);
        assert_eq!(result.series("sum_value"), &[10.0, 20.0]);
        assert_eq!(result.series("count"), &[1.0, 2.0]);
    }

    #[test]
    fn test_parse_plain_scalars() {
        let response = json!({
            "data": {
                "attributes": {
                    "dates": ["2025-09-01T00:00:00Z"],
                    "data": [321.0]
                }
            }
        });
        assert_eq!(parse_aggregate(&response).series("value"), &[321.0]);
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert!(parse_aggregate(&json!({})).is_empty());
        assert!(parse_aggregate(&json!({"data": {"attributes": {}}})).is_empty());
        assert!(parse_aggregate(&json!({"unexpected": true})).is_empty());
    }

    #[test]
    fn test_parse_grouped_sums() {
        let response = json!({
            "data": {
                "attributes": {
                    "data": [
                        {"groupings": {"flow_id": "F1"}, "measurements": {"sum_value": [100.0, 50.0]}},
                        {"groupings": {"flow_id": "F2"}, "measurements": {"sum_value": [25.0]}},
                        {"groupings": {"flow_id": "F1"}, "measurements": {"sum_value": 10.0}}
                    ]
                }
            }
        });

        let sums = parse_grouped_sums(&response, "flow_id", "sum_value");
        assert_eq!(sums.get("F1"), Some(&160.0));
        assert_eq!(sums.get("F2"), Some(&25.0));
    }

    #[test]
    fn test_report_rows_canonicalize_decimal_rates() {
        let response = json!({
            "data": {
                "attributes": {
                    "results": [{
                        "groupings": {"flow_id": "F1", "flow_message_id": "M1"},
                        "statistics": {
                            "recipients": 100,
                            "opens": 40,
                            "open_rate": 0.40,
                            "clicks": 10,
                            "click_rate": 0.10,
                            "conversions": 5,
                            "conversion_rate": 0.05,
                            "conversion_value": 500.0,
                            "bounce_rate": 0.004,
                            "unsubscribe_rate": 0.001,
                            "spam_complaint_rate": 0.0002
                        }
                    }]
                }
            }
        });

        let rows = parse_report_rows(&response);
        assert_eq!(rows.len(), 1);
        let stats = &rows[0].statistics;
        assert_eq!(rows[0].group("flow_id"), Some("F1"));
        assert_eq!(stats.recipients, 100);
        assert_eq!(stats.open_rate, 40.0);
        assert_eq!(stats.click_rate, 10.0);
        assert_eq!(stats.conversion_rate, 5.0);
        assert!((stats.bounce_rate - 0.4).abs() < 1e-9);
        assert!((stats.spam_complaint_rate - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_report_rows_percent_inputs_pass_through() {
        let response = json!({
            "data": {
                "attributes": {
                    "results": [{
                        "groupings": {"campaign_id": "C1"},
                        "statistics": {"recipients": 1000, "open_rate": 46.67, "click_rate": 10.0}
                    }]
                }
            }
        });

        let rows = parse_report_rows(&response);
        assert_eq!(rows[0].statistics.open_rate, 46.67);
        assert_eq!(rows[0].statistics.click_rate, 10.0);
    }

    #[test]
    fn test_report_rows_tolerate_string_counts() {
        let response = json!({
            "data": {
                "attributes": {
                    "results": [{
                        "groupings": {},
                        "statistics": {"recipients": "250", "conversion_value": "1234.5"}
                    }]
                }
            }
        });

        let rows = parse_report_rows(&response);
        assert_eq!(rows[0].statistics.recipients, 250);
        assert_eq!(rows[0].statistics.conversion_value, 1234.5);
    }
}
