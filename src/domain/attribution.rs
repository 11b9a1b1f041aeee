//! Attribution outputs: revenue totals, shares, and the time series

use serde::{Deserialize, Serialize};

/// Revenue totals with channel attribution for one window.
///
/// `attributed_revenue` is the raw flow + campaign sum as reported by the
/// provider, which can exceed `total_revenue` when attribution models
/// disagree; presentation uses [`AttributionSnapshot::capped_attributed`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionSnapshot {
    pub total_revenue: f64,
    pub total_orders: u64,
    pub flow_revenue: f64,
    pub campaign_revenue: f64,
    /// flow_revenue + campaign_revenue, uncapped
    pub attributed_revenue: f64,
    /// Share of total revenue attributed, percent, computed from the capped
    /// attributed value
    pub attributed_percentage: f64,
    /// Flow share of attributed revenue, percent
    pub flow_share: f64,
    /// Campaign share of attributed revenue, percent
    pub campaign_share: f64,
}

impl AttributionSnapshot {
    /// Compute derived percentages from the raw sums
    pub fn from_sums(
        total_revenue: f64,
        total_orders: u64,
        flow_revenue: f64,
        campaign_revenue: f64,
    ) -> Self {
        let attributed_revenue = flow_revenue + campaign_revenue;
        let capped = attributed_revenue.min(total_revenue);
        let attributed_percentage = if total_revenue > 0.0 {
            capped / total_revenue * 100.0
        } else {
            0.0
        };
        let (flow_share, campaign_share) = if attributed_revenue > 0.0 {
            (
                flow_revenue / attributed_revenue * 100.0,
                campaign_revenue / attributed_revenue * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            total_revenue,
            total_orders,
            flow_revenue,
            campaign_revenue,
            attributed_revenue,
            attributed_percentage,
            flow_share,
            campaign_share,
        }
    }

    /// Attributed revenue clamped to total for presentation
    pub fn capped_attributed(&self) -> f64 {
        self.attributed_revenue.min(self.total_revenue)
    }

    /// True when the provider reported more attributed than total revenue
    pub fn is_over_attributed(&self) -> bool {
        self.attributed_revenue > self.total_revenue
    }
}

/// One interval of the revenue time series.
///
/// Channel values are apportioned from the interval total by the global
/// flow/campaign ratios, so `total = flow + campaign + unattributed` holds
/// by construction up to floating-point error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    /// Canonical interval start date string
    pub date: String,
    pub total_revenue: f64,
    pub flow_revenue: f64,
    pub campaign_revenue: f64,
    pub unattributed_revenue: f64,
    pub orders: u64,
}

impl TimeSeriesPoint {
    pub fn attributed_revenue(&self) -> f64 {
        self.flow_revenue + self.campaign_revenue
    }
}

/// Totals-only summary of the preceding window used for the
/// period-over-period comparison. No per-entity or per-interval splits are
/// computed for the previous period.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    /// Percent change in total revenue vs the previous period
    pub total_change_pct: f64,
    /// Percent change in attributed revenue vs the previous period
    pub attributed_change_pct: f64,
    pub previous_total_revenue: f64,
    pub previous_attributed_revenue: f64,
    pub previous_start: String,
    pub previous_end: String,
}

impl PeriodComparison {
    pub fn compute(
        current: &AttributionSnapshot,
        previous: &AttributionSnapshot,
        previous_start: String,
        previous_end: String,
    ) -> Self {
        let total_change_pct = if previous.total_revenue > 0.0 {
            (current.total_revenue - previous.total_revenue) / previous.total_revenue * 100.0
        } else {
            0.0
        };
        let attributed_change_pct = if previous.attributed_revenue > 0.0 {
            (current.attributed_revenue - previous.attributed_revenue)
                / previous.attributed_revenue
                * 100.0
        } else {
            0.0
        };

        Self {
            total_change_pct,
            attributed_change_pct,
            previous_total_revenue: previous.total_revenue,
            previous_attributed_revenue: previous.attributed_revenue,
            previous_start,
            previous_end,
        }
    }
}
