//! klaviyo-audit - rate-governed extraction and attribution aggregation
//! for e-commerce email marketing audits
//!
//! The crate audits one Klaviyo account and produces an [`AuditBundle`]:
//! normalized metrics, attribution breakdowns, flow and campaign
//! statistics, list-growth series, form performance, and benchmark-driven
//! diagnostic findings. The engineered surface is the rate-limit-governed
//! API client and the attribution aggregator; rendering and narrative
//! generation are downstream consumers of the bundle.
//!
//! ```no_run
//! use klaviyo_audit::{extract_audit, AuditOptions, WindowSpec};
//!
//! # async fn run() -> klaviyo_audit::Result<()> {
//! let bundle = extract_audit(
//!     "pk_...",
//!     AuditOptions {
//!         window: WindowSpec::Days(90),
//!         ..Default::default()
//!     },
//! )
//! .await?;
//! println!("attributed: {:?}", bundle.attribution);
//! # Ok(())
//! # }
//! ```

pub mod attribution;
pub mod batch;
pub mod benchmarks;
pub mod client;
pub mod currency;
pub mod dates;
pub mod diagnostics;
pub mod domain;
pub mod filters;
pub mod observability;
pub mod orchestrator;
pub mod parsers;
pub mod sanitizer;
pub mod services;

// Re-export commonly used types
pub use attribution::{AttributionAggregator, RevenueAnalysis};
pub use benchmarks::Benchmarks;
pub use client::{ClientConfig, KlaviyoClient, RateTier, RequestPolicy};
pub use dates::DateWindow;
pub use domain::{
    AccountContext, AttributionSnapshot, AuditBundle, AuditError, CampaignSummary, Diagnostic,
    DiagnosticKind, EntityStatistics, FlowSummary, FormSummary, PeriodComparison, Result,
    Severity, TimeSeriesPoint,
};
pub use observability::{init_logging, LogFormat, LoggingConfig};
pub use orchestrator::{extract_audit, AuditOptions, AuditOrchestrator, ProgressEvent, WindowSpec};
pub use sanitizer::{sanitize_context, sanitize_field};
