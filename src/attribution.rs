//! Attribution aggregation: reconciling total revenue with channel-
//! attributed revenue
//!
//! Total revenue comes from the aggregation endpoint (per-interval sums of
//! the resolved revenue metric); flow and campaign revenue come from the
//! reporting endpoints, which use the dashboard's single-touch attribution
//! model. Per-interval channel values are apportioned from the interval
//! totals by the global flow/campaign ratios.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::batch::{run_batched, BatchSettings};
use crate::dates::DateWindow;
use crate::domain::attribution::{AttributionSnapshot, TimeSeriesPoint};
use crate::domain::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLog, Severity};
use crate::domain::entities::Channel;
use crate::domain::error::Result;
use crate::parsers::AggregateResult;
use crate::services::{
    timeframe_for_days, AggregateQuery, CampaignStatisticsService, CampaignsService,
    FlowStatisticsService, FlowsService, Interval, MetricAggregatesService, MetricsService,
};

/// Revenue metric preference order for totals
const REVENUE_METRIC_PRIMARY: &str = "Ordered Product";
const REVENUE_METRIC_FALLBACK: &str = "Placed Order";

/// Output of one attribution run
#[derive(Debug, Clone, Default)]
pub struct RevenueAnalysis {
    /// None when the conversion metric could not be resolved; total revenue
    /// is still reflected in the series
    pub snapshot: Option<AttributionSnapshot>,
    pub series: Vec<TimeSeriesPoint>,
}

/// Produces the audit's attribution snapshot and revenue time series
pub struct AttributionAggregator {
    metrics: Arc<MetricsService>,
    aggregates: Arc<MetricAggregatesService>,
    flows: Arc<FlowsService>,
    flow_stats: Arc<FlowStatisticsService>,
    campaigns: Arc<CampaignsService>,
    campaign_stats: Arc<CampaignStatisticsService>,
    diagnostics: DiagnosticLog,
    cancellation: CancellationToken,
}

impl AttributionAggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metrics: Arc<MetricsService>,
        aggregates: Arc<MetricAggregatesService>,
        flows: Arc<FlowsService>,
        flow_stats: Arc<FlowStatisticsService>,
        campaigns: Arc<CampaignsService>,
        campaign_stats: Arc<CampaignStatisticsService>,
        diagnostics: DiagnosticLog,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            metrics,
            aggregates,
            flows,
            flow_stats,
            campaigns,
            campaign_stats,
            diagnostics,
            cancellation,
        }
    }

    /// Full analysis: snapshot plus per-interval time series
    pub async fn analyze(&self, window: &DateWindow, interval: Interval) -> Result<RevenueAnalysis> {
        self.run(window, interval, true).await
    }

    /// Totals-only mode for the previous-period comparison: the same sums,
    /// no series construction.
    pub async fn analyze_totals(&self, window: &DateWindow) -> Result<Option<AttributionSnapshot>> {
        Ok(self.run(window, Interval::Day, false).await?.snapshot)
    }

    async fn run(
        &self,
        window: &DateWindow,
        interval: Interval,
        build_series: bool,
    ) -> Result<RevenueAnalysis> {
        let totals = self.total_revenue(window, interval).await?;
        let total_sum = totals.sum("sum_value");
        let total_orders = totals.sum("count").max(0.0) as u64;
        info!(
            total_revenue = total_sum,
            orders = total_orders,
            "total revenue resolved"
        );

        let conversion_metric = self.metrics.resolve_placed_order().await?;
        let Some(conversion_metric) = conversion_metric else {
            warn!("conversion metric absent, attribution omitted");
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MissingConversionMetric,
                Severity::High,
                "No conversion metric could be resolved; attribution is omitted and only total revenue is reported",
            ));
            let series = if build_series {
                build_time_series(&totals, 0.0, 0.0)
            } else {
                Vec::new()
            };
            return Ok(RevenueAnalysis {
                snapshot: None,
                series,
            });
        };
        self.metrics.set_conversion_metric(&conversion_metric.id).await;

        let timeframe = timeframe_for_days(window.days());
        let flow_sum = self.flow_revenue(timeframe, &conversion_metric.id).await;
        let campaign_sum = self
            .campaign_revenue(window, timeframe, &conversion_metric.id)
            .await;

        let snapshot =
            AttributionSnapshot::from_sums(total_sum, total_orders, flow_sum, campaign_sum);
        info!(
            attributed = snapshot.attributed_revenue,
            attributed_pct = snapshot.attributed_percentage,
            flow = flow_sum,
            campaign = campaign_sum,
            "attribution resolved"
        );

        if snapshot.is_over_attributed() {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DataAnomaly,
                    Severity::Medium,
                    "Attributed revenue exceeds total revenue; presentation caps attribution at the total",
                )
                .with_evidence("totalRevenue", snapshot.total_revenue)
                .with_evidence("attributedRevenue", snapshot.attributed_revenue),
            );
        }

        let series = if build_series {
            let (flow_ratio, campaign_ratio) = if total_sum > 0.0 {
                (flow_sum / total_sum, campaign_sum / total_sum)
            } else {
                (0.0, 0.0)
            };
            build_time_series(&totals, flow_ratio, campaign_ratio)
        } else {
            Vec::new()
        };

        Ok(RevenueAnalysis {
            snapshot: Some(snapshot),
            series,
        })
    }

    /// Total revenue series: primary metric at the requested interval, with
    /// day-interval and metric fallbacks when the response is empty.
    async fn total_revenue(&self, window: &DateWindow, interval: Interval) -> Result<AggregateResult> {
        let revenue_metric = match self
            .metrics
            .get_metric_by_name(REVENUE_METRIC_PRIMARY, None)
            .await?
        {
            Some(metric) => metric,
            None => {
                warn!("{REVENUE_METRIC_PRIMARY} not found, falling back to {REVENUE_METRIC_FALLBACK}");
                match self
                    .metrics
                    .get_metric_by_name(REVENUE_METRIC_FALLBACK, None)
                    .await?
                {
                    Some(metric) => metric,
                    None => {
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticKind::ParseIncomplete,
                            Severity::High,
                            "No revenue metric exists in the account; total revenue is reported as zero",
                        ));
                        return Ok(AggregateResult::default());
                    }
                }
            }
        };

        let mut result = self
            .query_revenue(&revenue_metric.id, window, interval)
            .await?;

        if result.is_empty() && interval == Interval::Month {
            warn!(metric = %revenue_metric.id, "month interval empty, retrying at day interval");
            result = self
                .query_revenue(&revenue_metric.id, window, Interval::Day)
                .await?;
        }

        if result.is_empty() && revenue_metric.name == REVENUE_METRIC_PRIMARY {
            warn!("primary revenue metric returned nothing, trying {REVENUE_METRIC_FALLBACK}");
            if let Some(fallback) = self
                .metrics
                .get_metric_by_name(REVENUE_METRIC_FALLBACK, Some(crate::services::metrics::PREFERRED_INTEGRATION))
                .await?
            {
                result = self.query_revenue(&fallback.id, window, interval).await?;
                if result.is_empty() && interval == Interval::Month {
                    result = self.query_revenue(&fallback.id, window, Interval::Day).await?;
                }
            }
        }

        Ok(result)
    }

    async fn query_revenue(
        &self,
        metric_id: &str,
        window: &DateWindow,
        interval: Interval,
    ) -> Result<AggregateResult> {
        let query = AggregateQuery::new(metric_id, window.start_str(), window.end_str())
            .measurements(&["sum_value", "count"])
            .interval(interval)
            .timezone(window.timezone.clone());
        self.aggregates.query(&query).await
    }

    /// Flow-attributed revenue: all flows, small batches, long pacing
    async fn flow_revenue(&self, timeframe: &'static str, conversion_metric_id: &str) -> f64 {
        let flows = match self.flows.get_flows().await {
            Ok(flows) => flows,
            Err(e) if e.is_slice_recoverable() => {
                warn!("flow listing failed, flow revenue contributes zero: {e}");
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::BatchFailure,
                        Severity::Medium,
                        "Flow listing failed; flow-attributed revenue is reported as zero",
                    )
                    .with_evidence("error", e.to_string()),
                );
                return 0.0;
            }
            Err(_) => return 0.0,
        };
        if flows.is_empty() {
            return 0.0;
        }

        let ids: Vec<String> = flows.into_iter().map(|f| f.id).collect();
        let merged = run_batched(
            &ids,
            "flow_id",
            BatchSettings::revenue(),
            &self.cancellation,
            &self.diagnostics,
            |chunk| async move {
                self.flow_stats
                    .get_statistics(
                        &chunk,
                        Some(&["conversion_value", "conversions"]),
                        timeframe,
                        Some(conversion_metric_id),
                    )
                    .await
            },
        )
        .await;

        merged.values().map(|stats| stats.conversion_value).sum()
    }

    /// Campaign-attributed revenue: date-filtered campaigns, full batches
    async fn campaign_revenue(
        &self,
        window: &DateWindow,
        timeframe: &'static str,
        conversion_metric_id: &str,
    ) -> f64 {
        let campaigns = match self
            .campaigns
            .get_campaigns(Some(window), Channel::Email)
            .await
        {
            Ok(campaigns) => campaigns,
            Err(e) if e.is_slice_recoverable() => {
                warn!("campaign listing failed, campaign revenue contributes zero: {e}");
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::BatchFailure,
                        Severity::Medium,
                        "Campaign listing failed; campaign-attributed revenue is reported as zero",
                    )
                    .with_evidence("error", e.to_string()),
                );
                return 0.0;
            }
            Err(_) => return 0.0,
        };
        if campaigns.is_empty() {
            return 0.0;
        }

        let ids: Vec<String> = campaigns.into_iter().map(|c| c.id).collect();
        let merged = run_batched(
            &ids,
            "campaign_id",
            BatchSettings::stats(),
            &self.cancellation,
            &self.diagnostics,
            |chunk| async move {
                self.campaign_stats
                    .get_statistics(
                        &chunk,
                        Some(&["conversion_value", "conversions"]),
                        timeframe,
                        Some(conversion_metric_id),
                    )
                    .await
            },
        )
        .await;

        merged.values().map(|stats| stats.conversion_value).sum()
    }
}

/// Apportion per-interval totals into flow/campaign/unattributed by the
/// global ratios; the remainder construction keeps
/// `total = flow + campaign + unattributed` exact.
fn build_time_series(
    totals: &AggregateResult,
    flow_ratio: f64,
    campaign_ratio: f64,
) -> Vec<TimeSeriesPoint> {
    let revenue = totals.series("sum_value");
    let orders = totals.series("count");

    totals
        .dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let total = revenue.get(i).copied().unwrap_or(0.0);
            let flow = total * flow_ratio;
            let campaign = total * campaign_ratio;
            TimeSeriesPoint {
                date: crate::dates::ensure_canonical(date),
                total_revenue: total,
                flow_revenue: flow,
                campaign_revenue: campaign,
                unattributed_revenue: total - flow - campaign,
                orders: orders.get(i).copied().unwrap_or(0.0).max(0.0) as u64,
            }
        })
        .collect()
}
