//! Domain types for the audit pipeline

pub mod account;
pub mod attribution;
pub mod bundle;
pub mod diagnostic;
pub mod entities;
pub mod error;
pub mod statistics;

pub use account::AccountContext;
pub use attribution::{AttributionSnapshot, PeriodComparison, TimeSeriesPoint};
pub use bundle::{AuditBundle, BenchmarkStatus, CampaignOverview, GrowthPoint, ListGrowth};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLog, Severity};
pub use entities::{
    CampaignSummary, Channel, FlowStatus, FlowSummary, FormKind, FormStanding, FormSummary,
    ListSummary, MetricRef,
};
pub use error::{AuditError, Result};
pub use statistics::{canonical_rate, EntityStatistics};
