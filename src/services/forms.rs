//! Form inventory and per-form performance (GET /forms/)

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::KlaviyoClient;
use crate::dates::DateWindow;
use crate::diagnostics::forms::standing_for;
use crate::domain::entities::{FormKind, FormSummary};
use crate::domain::error::Result;

use super::aggregates::{AggregateQuery, Interval, MetricAggregatesService};
use super::metrics::MetricsService;

/// Candidate names for the submit-tracking metric, in discovery order
const SUBMIT_METRIC_NAMES: &[&str] = &[
    "Submitted Form",
    "Submit Form",
    "Form Submission",
    "Form Submit",
    "Signup Form Submit",
    "Newsletter Signup",
    "Email Signup",
    "Form Completed",
];

/// Candidate names for the view-tracking metric, in discovery order
const VIEW_METRIC_NAMES: &[&str] = &[
    "Viewed Form",
    "View Form",
    "Form View",
    "Form Impression",
    "Form Display",
    "Signup Form View",
    "Newsletter Form View",
    "Form Shown",
];

/// Pause between per-form metric queries, on top of limiter pacing
const INTER_FORM_DELAY: Duration = Duration::from_millis(500);

/// A form as listed by the provider
#[derive(Debug, Clone)]
pub struct FormRecord {
    pub id: String,
    pub name: String,
    pub kind: FormKind,
}

/// Service for forms and their window-scoped performance
pub struct FormsService {
    client: Arc<KlaviyoClient>,
    metrics: Arc<MetricsService>,
    aggregates: Arc<MetricAggregatesService>,
}

impl FormsService {
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

    pub async fn get_forms(&self) -> Result<Vec<FormRecord>> {
        let response = self.client.get("/forms/", None).await?;
        let forms: Vec<FormRecord> = response
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_form).collect())
            .unwrap_or_default();
        info!(count = forms.len(), "fetched forms");
        Ok(forms)
    }

    /// Impressions, submissions, and submit rate per form over the window.
    ///
    /// The tracking metrics are discovered from candidate name lists; when
    /// neither exists the forms are returned with zeroed performance so the
    /// report can still show the inventory.
    pub async fn get_form_performance(&self, window: &DateWindow) -> Result<Vec<FormSummary>> {
        let forms = self.get_forms().await?;
        if forms.is_empty() {
            return Ok(Vec::new());
        }

        let submit_metric = self.discover_metric(SUBMIT_METRIC_NAMES).await?;
        let view_metric = self.discover_metric(VIEW_METRIC_NAMES).await?;
        debug!(
            submit = submit_metric.is_some(),
            view = view_metric.is_some(),
            "form metric discovery complete"
        );

        if submit_metric.is_none() && view_metric.is_none() {
            warn!("no form tracking metrics found, reporting inventory with zero performance");
            return Ok(forms
                .into_iter()
                .map(|form| FormSummary {
                    id: form.id,
                    name: form.name,
                    kind: form.kind,
                    impressions: 0,
                    submissions: 0,
                    submit_rate: 0.0,
                    standing: crate::domain::entities::FormStanding::None,
                })
                .collect());
        }

        let start = window.start_str();
        let end = window.end_str();
        let mut summaries = Vec::with_capacity(forms.len());

        for (index, form) in forms.iter().enumerate() {
            let impressions = match &view_metric {
                Some(id) => self.form_metric_count(id, &form.id, &start, &end, window).await,
                None => 0.0,
            };
            let submissions = match &submit_metric {
                Some(id) => self.form_metric_count(id, &form.id, &start, &end, window).await,
                None => 0.0,
            };

            let submit_rate = if impressions > 0.0 {
                submissions / impressions * 100.0
            } else {
                0.0
            };

            debug!(
                form = %form.name,
                impressions,
                submissions,
                "form performance"
            );

            summaries.push(FormSummary {
                id: form.id.clone(),
                name: form.name.clone(),
                kind: form.kind,
                impressions: impressions as u64,
                submissions: submissions as u64,
                submit_rate,
                standing: standing_for(form.kind, submit_rate),
            });

            if index + 1 < forms.len() {
                sleep(INTER_FORM_DELAY).await;
            }
        }

        summaries.sort_by(|a, b| b.impressions.cmp(&a.impressions));
        Ok(summaries)
    }

    async fn discover_metric(&self, candidates: &[&str]) -> Result<Option<String>> {
        let metrics = self.metrics.get_metrics().await?;
        for name in candidates {
            if let Some(metric) = metrics.iter().find(|m| m.name == *name) {
                debug!(metric = name, id = %metric.id, "discovered form metric");
                return Ok(Some(metric.id.clone()));
            }
        }
        Ok(None)
    }

    /// Total count of one metric filtered to a single form over the window
    async fn form_metric_count(
        &self,
        metric_id: &str,
        form_id: &str,
        start: &str,
        end: &str,
        window: &DateWindow,
    ) -> f64 {
        let query = AggregateQuery::new(metric_id, start, end)
            .measurements(&["count"])
            .interval(Interval::Day)
            .additional_filter(format!("equals(form_id,\"{form_id}\")"))
            .timezone(window.timezone.clone());

        match self.aggregates.query(&query).await {
            Ok(result) => result.sum("count"),
            Err(e) => {
                warn!(form_id, "form metric query failed: {e}");
                0.0
            }
        }
    }
}

fn parse_form(item: &Value) -> Option<FormRecord> {
    let id = item.get("id")?.as_str()?.to_string();
    let attrs = item.get("attributes")?;
    Some(FormRecord {
        id,
        name: attrs
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Form")
            .to_string(),
        kind: attrs
            .get("form_type")
            .and_then(Value::as_str)
            .map(FormKind::parse)
            .unwrap_or(FormKind::Other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_form() {
        let item = json!({
            "id": "W1",
            "attributes": {"name": "Newsletter Popup", "form_type": "popup"}
        });
        let form = parse_form(&item).unwrap();
        assert_eq!(form.kind, FormKind::Popup);

        let item = json!({"id": "W2", "attributes": {"name": "Footer"}});
        assert_eq!(parse_form(&item).unwrap().kind, FormKind::Other);
    }
}
