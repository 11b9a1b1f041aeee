//! Provider filter DSL builders
//!
//! The aggregation endpoint takes an array of filter strings with required
//! datetime bounds; the campaigns endpoint takes a single string combined
//! with `and(...)`; the reporting endpoints use `equals`/`contains-any` and
//! accept at most 100 ids per filter.

/// Maximum ids one reporting-API filter may carry; callers chunk above this
pub const REPORTING_FILTER_MAX_IDS: usize = 100;

/// Filter array for the metric-aggregates endpoint. Datetime bounds are
/// required; at most one additional filter is honored by the API.
pub fn metric_filter(start: &str, end: &str, additional: Option<&str>) -> Vec<String> {
    let mut filters = vec![
        format!("greater-or-equal(datetime,{start})"),
        format!("less-than(datetime,{end})"),
    ];
    if let Some(extra) = additional {
        filters.push(extra.to_string());
    }
    filters
}

/// Filter string for the campaigns endpoint. Date conditions are omitted on
/// purpose: the provider's date filters on campaigns are unreliable, so
/// callers filter by `created_at` client-side.
pub fn campaign_filter(channel: &str) -> String {
    let conditions = vec![format!("equals(messages.channel,'{channel}')")];
    if conditions.len() > 1 {
        format!("and({})", conditions.join(","))
    } else {
        conditions.into_iter().next().unwrap_or_default()
    }
}

/// Filter string for the reporting endpoints: `equals` for a single id,
/// `contains-any` for several. Ids beyond the 100-id cap are dropped here;
/// batching above this layer keeps chunks within the cap.
pub fn reporting_filter(ids: &[String], id_field: &str) -> String {
    let subset = &ids[..ids.len().min(REPORTING_FILTER_MAX_IDS)];
    if subset.len() == 1 {
        format!("equals({id_field},\"{}\")", subset[0])
    } else {
        let joined = subset.join("\",\"");
        format!("contains-any({id_field},[\"{joined}\"])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_metric_filter_bounds() {
        let filters = metric_filter("2025-09-01T00:00:00Z", "2025-12-01T00:00:00Z", None);
        assert_eq!(
            filters,
            vec![
                "greater-or-equal(datetime,2025-09-01T00:00:00Z)".to_string(),
                "less-than(datetime,2025-12-01T00:00:00Z)".to_string(),
            ]
        );
    }

    #[test]
    fn test_metric_filter_additional() {
        let filters = metric_filter(
            "2025-09-01T00:00:00Z",
            "2025-12-01T00:00:00Z",
            Some("equals(form_id,\"W1\")"),
        );
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[2], "equals(form_id,\"W1\")");
    }

    #[test]
    fn test_campaign_filter() {
        assert_eq!(campaign_filter("email"), "equals(messages.channel,'email')");
        assert_eq!(campaign_filter("sms"), "equals(messages.channel,'sms')");
    }

    #[test]
    fn test_reporting_filter_single() {
        let ids = vec!["C1".to_string()];
        assert_eq!(reporting_filter(&ids, "campaign_id"), "equals(campaign_id,\"C1\")");
    }

    #[test]
    fn test_reporting_filter_multiple() {
        let ids = vec!["F1".to_string(), "F2".to_string()];
        assert_eq!(
            reporting_filter(&ids, "flow_id"),
            "contains-any(flow_id,[\"F1\",\"F2\"])"
        );
    }

    #[test]
    fn test_reporting_filter_caps_at_100() {
        let ids: Vec<String> = (0..150).map(|i| format!("ID{i}")).collect();
        let filter = reporting_filter(&ids, "flow_id");
        assert!(filter.contains("ID99"));
        assert!(!filter.contains("ID100\""));
    }
}
