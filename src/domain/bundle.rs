//! The audit bundle: the single composite value handed to downstream
//! renderers and narrators

use serde::{Deserialize, Serialize};

use super::account::AccountContext;
use super::attribution::{AttributionSnapshot, PeriodComparison, TimeSeriesPoint};
use super::diagnostic::Diagnostic;
use super::entities::{CampaignSummary, FlowSummary, FormSummary};
use super::statistics::EntityStatistics;
use crate::dates::DateWindow;

/// Classification of an observed rate against an industry benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkStatus {
    Exceeds,
    Meets,
    Below,
}

impl BenchmarkStatus {
    /// Exceeds at >= 1.1x the benchmark, meets at >= 0.9x, below otherwise
    pub fn classify(observed: f64, benchmark: f64) -> Self {
        if observed >= benchmark * 1.1 {
            BenchmarkStatus::Exceeds
        } else if observed >= benchmark * 0.9 {
            BenchmarkStatus::Meets
        } else {
            BenchmarkStatus::Below
        }
    }
}

/// Aggregate campaign performance across the window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignOverview {
    /// Counts summed across campaigns with recipients; rates recomputed
    pub statistics: EntityStatistics,
    pub campaign_count: usize,
    pub campaigns_per_month: usize,
    /// Campaign-attributed revenue for the window
    pub total_revenue: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_rate_vs_benchmark: Option<BenchmarkStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_rate_vs_benchmark: Option<BenchmarkStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_rate_vs_benchmark: Option<BenchmarkStatus>,
}

/// One month of list growth
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    /// Canonical interval start date
    pub date: String,
    pub new_subscribers: i64,
    pub lost_subscribers: i64,
    pub net_change: i64,
}

/// Growth of the primary marketing list over the trailing months
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGrowth {
    pub list_id: String,
    pub list_name: String,
    pub current_total: u64,
    pub period_months: u32,
    pub new_subscribers: i64,
    pub lost_subscribers: i64,
    pub net_change: i64,
    /// lost / new, percent
    pub churn_rate: f64,
    pub monthly: Vec<GrowthPoint>,
}

/// Everything one audit run produced. Immutable once assembled; the
/// orchestrator owns all collections for the duration of the run and then
/// moves them here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditBundle {
    pub account: AccountContext,
    pub window: DateWindow,
    /// None when the conversion metric could not be resolved; total revenue
    /// may still be present in the time series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<AttributionSnapshot>,
    pub time_series: Vec<TimeSeriesPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_period: Option<PeriodComparison>,
    pub campaigns: Vec<CampaignSummary>,
    pub campaign_overview: CampaignOverview,
    pub flows: Vec<FlowSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_growth: Option<ListGrowth>,
    pub forms: Vec<FormSummary>,
    pub diagnostics: Vec<Diagnostic>,
    pub fast_mode: bool,
}
