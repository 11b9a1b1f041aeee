//! Lists, profile counts, primary-list selection, and growth series

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::KlaviyoClient;
use crate::dates::{ensure_canonical, window_months};
use crate::domain::bundle::{GrowthPoint, ListGrowth};
use crate::domain::entities::ListSummary;
use crate::domain::error::Result;

use super::aggregates::{AggregateQuery, Interval, MetricAggregatesService};
use super::metrics::MetricsService;

/// The growth endpoint is unreliable beyond six months; longer requests are
/// capped here.
pub const MAX_GROWTH_MONTHS: u32 = 6;

/// Metric names tried for the unsubscribe series, in order
const UNSUBSCRIBE_METRIC_NAMES: &[&str] = &[
    "Unsubscribed from List",
    "Unsubscribed",
    "Unsubscribed from Email",
    "Unsubscribed from Campaign",
    "Unsubscribed from Flow",
];

/// A list as returned by GET /lists/
#[derive(Debug, Clone)]
pub struct ListRecord {
    pub id: String,
    pub name: String,
}

/// Service for lists and subscriber growth
pub struct ListsService {
    client: Arc<KlaviyoClient>,
    metrics: Arc<MetricsService>,
    aggregates: Arc<MetricAggregatesService>,
}

impl ListsService {
    pub fn new(
        client: Arc<KlaviyoClient>,
        metrics: Arc<MetricsService>,
        aggregates: Arc<MetricAggregatesService>,
    ) -> Self {
        Self {
            client,
            metrics,
            aggregates,
        }
    }

    /// All lists in the account, following cursor links until exhausted
    pub async fn get_lists(&self) -> Result<Vec<ListRecord>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let response = match &cursor {
                Some(cursor) => {
                    let query = [("page[cursor]", cursor.clone())];
                    self.client.get("/lists/", Some(&query)).await?
                }
                None => self.client.get("/lists/", None).await?,
            };

            let page: Vec<ListRecord> = response
                .get("data")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(parse_list).collect())
                .unwrap_or_default();
            debug!(page = page.len(), total = all.len() + page.len(), "fetched lists page");
            all.extend(page);

            cursor = response
                .get("links")
                .and_then(|l| l.get("next"))
                .and_then(Value::as_str)
                .and_then(extract_cursor);
            if cursor.is_none() {
                break;
            }
        }

        info!(count = all.len(), "fetched all lists");
        Ok(all)
    }

    /// Profile count for one list: `additional-fields[list]=profile_count`
    /// first, then a one-profile page read of `meta.pagination.total`.
    pub async fn get_list_profile_count(&self, list_id: &str) -> Result<u64> {
        let query = [("additional-fields[list]", "profile_count".to_string())];
        match self.client.get(&format!("/lists/{list_id}"), Some(&query)).await {
            Ok(response) => {
                if let Some(count) = response
                    .get("data")
                    .and_then(|d| d.get("attributes"))
                    .and_then(|a| a.get("profile_count"))
                    .and_then(Value::as_u64)
                {
                    return Ok(count);
                }
            }
            Err(e) if e.is_slice_recoverable() => {
                warn!(list_id, "additional-fields profile count failed: {e}");
            }
            Err(e) => return Err(e),
        }

        let query = [("page[size]", "1".to_string())];
        let response = self
            .client
            .get(&format!("/lists/{list_id}/profiles/"), Some(&query))
            .await?;
        Ok(response
            .get("meta")
            .and_then(|m| m.get("pagination"))
            .and_then(|p| p.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    /// Pick the primary marketing list: exclude Shopify collection lists,
    /// score the rest (subscribed members > cleaned members > members >
    /// other), fetch counts, and take the best (priority, count) pair.
    /// Falls back to the first list with a nonzero count.
    pub async fn select_primary_list(&self) -> Result<Option<ListSummary>> {
        let lists = self.get_lists().await?;
        if lists.is_empty() {
            return Ok(None);
        }

        let mut candidates: Vec<ListSummary> = Vec::new();
        for list in &lists {
            let Some(priority) = list_priority(&list.name) else {
                debug!(name = %list.name, "skipping product-collection list");
                continue;
            };
            let profile_count = self.get_list_profile_count(&list.id).await.unwrap_or(0);
            debug!(name = %list.name, profile_count, priority, "list candidate");
            candidates.push(ListSummary {
                id: list.id.clone(),
                name: list.name.clone(),
                profile_count,
                priority,
            });
        }

        candidates.retain(|c| c.profile_count > 0);
        candidates.sort_by(|a, b| {
            (b.priority, b.profile_count).cmp(&(a.priority, a.profile_count))
        });

        if let Some(best) = candidates.first() {
            info!(name = %best.name, members = best.profile_count, "selected primary list");
            return Ok(Some(best.clone()));
        }

        // All scored candidates were empty; take the first list with any
        // profiles at all
        for list in &lists {
            let count = self.get_list_profile_count(&list.id).await.unwrap_or(0);
            if count > 0 {
                return Ok(Some(ListSummary {
                    id: list.id.clone(),
                    name: list.name.clone(),
                    profile_count: count,
                    priority: 0,
                }));
            }
        }
        Ok(None)
    }

    /// Growth of the chosen (or auto-selected) list over the trailing
    /// months, capped at six.
    pub async fn get_list_growth(
        &self,
        list_id: Option<&str>,
        months: u32,
    ) -> Result<Option<ListGrowth>> {
        let selected = match list_id {
            Some(id) => {
                let response = self.client.get(&format!("/lists/{id}"), None).await?;
                let name = response
                    .get("data")
                    .and_then(|d| d.get("attributes"))
                    .and_then(|a| a.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("Selected List")
                    .to_string();
                let count = self.get_list_profile_count(id).await.unwrap_or(0);
                ListSummary {
                    id: id.to_string(),
                    name,
                    profile_count: count,
                    priority: 0,
                }
            }
            None => match self.select_primary_list().await? {
                Some(list) => list,
                None => {
                    warn!("no usable list found for growth analysis");
                    return Ok(None);
                }
            },
        };

        let effective_months = months.min(MAX_GROWTH_MONTHS);
        if months > MAX_GROWTH_MONTHS {
            warn!(
                requested = months,
                capped = effective_months,
                "growth period capped for endpoint reliability"
            );
        }
        let window = window_months(effective_months, "UTC");
        let start = window.start_str();
        let end = window.end_str();

        let subscribed = self
            .metrics
            .get_metric_by_name("Subscribed to List", None)
            .await?;
        let mut unsubscribed = None;
        for name in UNSUBSCRIBE_METRIC_NAMES {
            if let Some(metric) = self.metrics.get_metric_by_name(name, None).await? {
                info!(metric = name, "found unsubscribe metric");
                unsubscribed = Some(metric);
                break;
            }
        }
        if unsubscribed.is_none() {
            warn!("no unsubscribe metric found, growth will show 0 lost subscribers");
        }

        let sub_series = match &subscribed {
            Some(metric) => self.monthly_counts(&metric.id, &start, &end).await?,
            None => (Vec::new(), Vec::new()),
        };
        let unsub_series = match &unsubscribed {
            Some(metric) => self.monthly_counts(&metric.id, &start, &end).await?,
            None => (Vec::new(), Vec::new()),
        };

        let dates = if !sub_series.0.is_empty() {
            sub_series.0.clone()
        } else {
            unsub_series.0.clone()
        };

        let mut monthly = Vec::new();
        let mut total_new: i64 = 0;
        let mut total_lost: i64 = 0;
        for (i, date) in dates.iter().enumerate() {
            let new_subscribers = sub_series.1.get(i).copied().unwrap_or(0.0) as i64;
            let lost_subscribers = unsub_series.1.get(i).copied().unwrap_or(0.0) as i64;
            total_new += new_subscribers;
            total_lost += lost_subscribers;
            monthly.push(GrowthPoint {
                date: ensure_canonical(date),
                new_subscribers,
                lost_subscribers,
                net_change: new_subscribers - lost_subscribers,
            });
        }

        let churn_rate = if total_new > 0 {
            total_lost as f64 / total_new as f64 * 100.0
        } else {
            0.0
        };

        Ok(Some(ListGrowth {
            list_id: selected.id,
            list_name: selected.name,
            current_total: selected.profile_count,
            period_months: effective_months,
            new_subscribers: total_new,
            lost_subscribers: total_lost,
            net_change: total_new - total_lost,
            churn_rate,
            monthly,
        }))
    }

    /// Monthly counts for one metric, falling back to day interval
    /// aggregated into months when the month interval yields nothing.
    async fn monthly_counts(
        &self,
        metric_id: &str,
        start: &str,
        end: &str,
    ) -> Result<(Vec<String>, Vec<f64>)> {
        let month_query = AggregateQuery::new(metric_id, start, end)
            .measurements(&["count"])
            .interval(Interval::Month);
        let result = self.aggregates.query(&month_query).await?;
        if !result.is_empty() {
            return Ok((result.dates.clone(), result.series("count").to_vec()));
        }

        debug!(metric_id, "month interval empty, trying day interval");
        let day_query = AggregateQuery::new(metric_id, start, end)
            .measurements(&["count"])
            .interval(Interval::Day);
        let daily = self.aggregates.query(&day_query).await?;
        if daily.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        Ok(roll_up_to_months(&daily.dates, daily.series("count")))
    }
}

fn parse_list(item: &Value) -> Option<ListRecord> {
    Some(ListRecord {
        id: item.get("id")?.as_str()?.to_string(),
        name: item
            .get("attributes")?
            .get("name")?
            .as_str()
            .unwrap_or("Unnamed List")
            .to_string(),
    })
}

/// Selection priority; None excludes the list entirely
fn list_priority(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    if lower.contains("shopify collection") {
        return None;
    }
    if lower.contains("members") {
        if lower.contains("subscribed") && !lower.contains("cleaned") {
            return Some(20);
        }
        if lower.contains("cleaned") {
            return Some(15);
        }
        return Some(10);
    }
    Some(5)
}

/// Cursor parameter from a pagination link
fn extract_cursor(next_url: &str) -> Option<String> {
    let parsed = Url::parse(next_url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "page[cursor]")
        .map(|(_, value)| value.into_owned())
}

/// Aggregate a daily series into calendar months, labeling each month with
/// its first observed date.
fn roll_up_to_months(dates: &[String], values: &[f64]) -> (Vec<String>, Vec<f64>) {
    let mut month_labels: Vec<String> = Vec::new();
    let mut month_totals: Vec<f64> = Vec::new();
    let mut current_month: Option<String> = None;

    for (i, date) in dates.iter().enumerate() {
        let month_key = date.get(..7).unwrap_or(date).to_string();
        let value = values.get(i).copied().unwrap_or(0.0);
        if current_month.as_deref() == Some(month_key.as_str()) {
            if let Some(last) = month_totals.last_mut() {
                *last += value;
            }
        } else {
            current_month = Some(month_key);
            month_labels.push(date.clone());
            month_totals.push(value);
        }
    }

    (month_labels, month_totals)
}
