//! Endpoint services, one per provider resource family
//!
//! Services hold a shared reference to the HTTP client and never open their
//! own network primitives. All of them are stateless except the metrics
//! service (memoized conversion metric), the account service (memoized
//! account attributes), and the flow statistics service (bounded response
//! cache).

pub mod account;
pub mod aggregates;
pub mod campaign_stats;
pub mod campaigns;
pub mod flow_stats;
pub mod flows;
pub mod forms;
pub mod lists;
pub mod metrics;

pub use account::AccountService;
pub use aggregates::{AggregateQuery, Interval, MetricAggregatesService};
pub use campaign_stats::CampaignStatisticsService;
pub use campaigns::CampaignsService;
pub use flow_stats::FlowStatisticsService;
pub use flows::{FlowAction, FlowRecord, FlowsService};
pub use forms::{FormRecord, FormsService};
pub use lists::{ListRecord, ListsService};
pub use metrics::MetricsService;

/// Reporting-API timeframe preset nearest a window length
pub fn timeframe_for_days(days: i64) -> &'static str {
    if days <= 7 {
        "last_7_days"
    } else if days <= 30 {
        "last_30_days"
    } else if days <= 90 {
        "last_90_days"
    } else {
        "last_365_days"
    }
}
