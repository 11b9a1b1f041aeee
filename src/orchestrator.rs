//! Top-level extract → aggregate → diagnose pipeline
//!
//! The orchestrator owns the bundle and every transient collection for one
//! run. Independent sub-pipelines (attribution, campaigns, flows, lists,
//! forms) run concurrently over one shared client and therefore one rate
//! limiter; each recovers locally from slice-level failures so the bundle
//! always materializes with whatever could be extracted, plus the
//! diagnostics that explain the gaps.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::attribution::{AttributionAggregator, RevenueAnalysis};
use crate::batch::{run_batched, BatchSettings};
use crate::benchmarks::Benchmarks;
use crate::client::{ClientConfig, KlaviyoClient, RateTier};
use crate::dates::{parse_iso, previous_period, validate_window, window_days, window_months, DateWindow};
use crate::diagnostics::{analyze_flow_ecosystem, campaign_diagnostics, form_diagnostics, identify_core_flows};
use crate::domain::attribution::PeriodComparison;
use crate::domain::bundle::{AuditBundle, BenchmarkStatus, CampaignOverview};
use crate::domain::diagnostic::{Diagnostic, DiagnosticLog};
use crate::domain::entities::{CampaignSummary, Channel, FlowSummary, FormSummary};
use crate::domain::error::{AuditError, Result};
use crate::domain::statistics::EntityStatistics;
use crate::domain::{AccountContext, ListGrowth};
use crate::services::{
    timeframe_for_days, AccountService, CampaignStatisticsService, CampaignsService,
    FlowStatisticsService, FlowsService, FormsService, Interval, ListsService,
    MetricAggregatesService, MetricsService,
};

/// Deep dives (email action counting) are limited to this many flows to
/// protect the rate budget.
const MAX_FLOW_DEEP_DIVES: usize = 10;

/// How the analysis window is specified
#[derive(Debug, Clone)]
pub enum WindowSpec {
    Days(u32),
    Months(u32),
    Range { start: String, end: String },
}

impl Default for WindowSpec {
    fn default() -> Self {
        WindowSpec::Days(90)
    }
}

/// Section-level progress event; emission is best-effort and never blocks
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub section: &'static str,
    pub message: String,
}

/// Options for one audit run
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub window: WindowSpec,
    /// Benchmark industry key
    pub industry: String,
    pub rate_tier: RateTier,
    /// Skip list growth, form performance, and per-flow deep dives
    pub fast_mode: bool,
    pub include_enhanced: bool,
    pub verbose_progress: bool,
    pub cancellation: Option<CancellationToken>,
    pub progress: Option<UnboundedSender<ProgressEvent>>,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            window: WindowSpec::default(),
            industry: crate::benchmarks::DEFAULT_INDUSTRY.to_string(),
            rate_tier: RateTier::Medium,
            fast_mode: false,
            include_enhanced: true,
            verbose_progress: false,
            cancellation: None,
            progress: None,
        }
    }
}

/// The audit pipeline. Construct once per run.
pub struct AuditOrchestrator {
    account: AccountService,
    campaigns: Arc<CampaignsService>,
    campaign_stats: Arc<CampaignStatisticsService>,
    flows: Arc<FlowsService>,
    flow_stats: Arc<FlowStatisticsService>,
    lists: ListsService,
    forms: FormsService,
    attribution: AttributionAggregator,
    benchmarks: Benchmarks,
    diagnostics: DiagnosticLog,
    cancellation: CancellationToken,
    options: AuditOptions,
}

impl AuditOrchestrator {
    pub fn new(mut config: ClientConfig, options: AuditOptions) -> Result<Self> {
        config.rate_tier = options.rate_tier;
        let cancellation = options.cancellation.clone().unwrap_or_default();
        let client = Arc::new(KlaviyoClient::with_cancellation(
            config,
            cancellation.clone(),
        )?);

        let diagnostics = DiagnosticLog::new();
        let metrics = Arc::new(MetricsService::new(client.clone()));
        let aggregates = Arc::new(MetricAggregatesService::new(
            client.clone(),
            diagnostics.clone(),
        ));
        let campaigns = Arc::new(CampaignsService::new(client.clone()));
        let campaign_stats = Arc::new(CampaignStatisticsService::new(
            client.clone(),
            metrics.clone(),
        ));
        let flows = Arc::new(FlowsService::new(client.clone()));
        let flow_stats = Arc::new(FlowStatisticsService::new(client.clone(), metrics.clone()));

        let attribution = AttributionAggregator::new(
            metrics.clone(),
            aggregates.clone(),
            flows.clone(),
            flow_stats.clone(),
            campaigns.clone(),
            campaign_stats.clone(),
            diagnostics.clone(),
            cancellation.clone(),
        );

        Ok(Self {
            account: AccountService::new(client.clone()),
            campaigns,
            campaign_stats,
            flows,
            flow_stats,
            lists: ListsService::new(client.clone(), metrics.clone(), aggregates.clone()),
            forms: FormsService::new(client, metrics, aggregates),
            attribution,
            benchmarks: Benchmarks::new(options.industry.clone()),
            diagnostics,
            cancellation,
            options,
        })
    }

    /// Run the full pipeline and assemble the bundle
    pub async fn run(&self) -> Result<AuditBundle> {
        self.emit("account", "loading account context");
        let account = self.account.get_context().await?;

        let window = self.resolve_window(&account)?;
        let days = window.days();
        info!(
            start = %window.start_str(),
            end = %window.end_str(),
            days,
            "window resolved"
        );

        let interval = if days >= 60 { Interval::Month } else { Interval::Day };
        let timeframe = timeframe_for_days(days);

        self.emit("extract", "extracting revenue, campaigns, flows, lists, and forms");
        let (revenue, campaigns, flows, list_growth, forms) = tokio::join!(
            self.revenue_pipeline(&window, interval, days),
            self.campaign_pipeline(&window, timeframe),
            self.flow_pipeline(timeframe),
            self.list_pipeline(),
            self.form_pipeline(&window),
        );
        let (revenue, comparison) = revenue?;
        let campaigns = campaigns?;
        let flows = flows?;
        let list_growth = list_growth?;
        let forms = forms?;

        self.emit("diagnose", "classifying findings against benchmarks");
        let overview = self.campaign_overview(&campaigns, &revenue, days);
        self.diagnostics.extend(analyze_flow_ecosystem(&flows));
        if overview.campaign_count > 0 {
            self.diagnostics
                .extend(campaign_diagnostics(&overview.statistics, &self.benchmarks));
        }
        self.diagnostics.extend(form_diagnostics(&forms));

        self.emit("bundle", "assembling audit bundle");
        Ok(AuditBundle {
            account,
            window,
            attribution: revenue.snapshot,
            time_series: revenue.series,
            previous_period: comparison,
            campaigns,
            campaign_overview: overview,
            flows,
            list_growth,
            forms,
            diagnostics: self.diagnostics.drain(),
            fast_mode: self.options.fast_mode,
        })
    }

    fn resolve_window(&self, account: &AccountContext) -> Result<DateWindow> {
        match &self.options.window {
            WindowSpec::Days(days) => {
                if *days == 0 {
                    return Err(AuditError::validation("window days must be positive"));
                }
                Ok(window_days(*days, &account.timezone))
            }
            WindowSpec::Months(months) => {
                if *months == 0 {
                    return Err(AuditError::validation("window months must be positive"));
                }
                Ok(window_months(*months, &account.timezone))
            }
            WindowSpec::Range { start, end } => {
                let start = parse_iso(start)?;
                let end = parse_iso(end)?;
                validate_window(start, end, &account.timezone)
            }
        }
    }

    /// Attribution for the current window plus the totals-only previous
    /// period comparison.
    async fn revenue_pipeline(
        &self,
        window: &DateWindow,
        interval: Interval,
        days: i64,
    ) -> Result<(RevenueAnalysis, Option<PeriodComparison>)> {
        self.emit("revenue", "querying revenue and attribution");
        let revenue = match self.attribution.analyze(window, interval).await {
            Ok(revenue) => revenue,
            Err(e) => {
                self.recover::<()>("revenue", e)?;
                RevenueAnalysis::default()
            }
        };

        let comparison = match &revenue.snapshot {
            Some(current) => {
                self.emit("revenue", "querying previous period totals");
                let previous_window = previous_period(window, days.max(1) as u32);
                match self.attribution.analyze_totals(&previous_window).await {
                    Ok(Some(previous)) => Some(PeriodComparison::compute(
                        current,
                        &previous,
                        previous_window.start_str(),
                        previous_window.end_str(),
                    )),
                    Ok(None) => None,
                    Err(e) => {
                        self.recover::<()>("previous-period", e)?;
                        None
                    }
                }
            }
            None => None,
        };

        Ok((revenue, comparison))
    }

    /// Campaign inventory across channels with batched statistics
    async fn campaign_pipeline(
        &self,
        window: &DateWindow,
        timeframe: &'static str,
    ) -> Result<Vec<CampaignSummary>> {
        self.emit("campaigns", "fetching campaigns by channel");
        let pages = futures::future::join_all(
            [Channel::Email, Channel::Sms, Channel::Push]
                .map(|channel| self.campaigns.get_campaigns(Some(window), channel)),
        )
        .await;

        let mut campaigns: Vec<CampaignSummary> = Vec::new();
        for page in pages {
            match page {
                Ok(mut page) => campaigns.append(&mut page),
                Err(e) => self.recover("campaigns", e)?,
            }
        }
        if campaigns.is_empty() {
            return Ok(campaigns);
        }

        let ids: Vec<String> = campaigns.iter().map(|c| c.id.clone()).collect();
        let stats = run_batched(
            &ids,
            "campaign_id",
            BatchSettings::stats(),
            &self.cancellation,
            &self.diagnostics,
            |chunk| async move {
                self.campaign_stats
                    .get_statistics(&chunk, None, timeframe, None)
                    .await
            },
        )
        .await;

        for campaign in &mut campaigns {
            if let Some(found) = stats.get(&campaign.id) {
                campaign.statistics = found.clone();
            }
        }
        Ok(campaigns)
    }

    /// Flow inventory with per-flow aggregated statistics and, outside fast
    /// mode, email action counts for the identified core flows.
    async fn flow_pipeline(&self, timeframe: &'static str) -> Result<Vec<FlowSummary>> {
        self.emit("flows", "fetching flows and statistics");
        let records = match self.flows.get_flows().await {
            Ok(records) => records,
            Err(e) => {
                self.recover::<()>("flows", e)?;
                return Ok(Vec::new());
            }
        };
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = records.iter().map(|f| f.id.clone()).collect();
        let stats: HashMap<String, EntityStatistics> = run_batched(
            &ids,
            "flow_id",
            BatchSettings::stats(),
            &self.cancellation,
            &self.diagnostics,
            |chunk| async move {
                self.flow_stats
                    .get_statistics(
                        &chunk,
                        Some(&[
                            "recipients",
                            "opens",
                            "open_rate",
                            "clicks",
                            "click_rate",
                            "conversions",
                            "conversion_rate",
                            "conversion_value",
                        ]),
                        timeframe,
                        None,
                    )
                    .await
            },
        )
        .await;

        let mut flows: Vec<FlowSummary> = records
            .into_iter()
            .map(|record| FlowSummary {
                statistics: stats.get(&record.id).cloned().unwrap_or_default(),
                id: record.id,
                name: record.name,
                status: record.status,
                email_action_count: 0,
            })
            .collect();

        if !self.options.fast_mode {
            self.emit("flows", "counting email actions for core flows");
            let core = identify_core_flows(&flows);
            let mut action_counts: HashMap<String, usize> = HashMap::new();
            for flow in core.values().take(MAX_FLOW_DEEP_DIVES) {
                match self.flows.get_flow_actions(&flow.id).await {
                    Ok(actions) => {
                        let emails = actions.iter().filter(|a| a.is_email()).count();
                        action_counts.insert(flow.id.clone(), emails);
                    }
                    Err(AuditError::Cancelled) => {
                        self.diagnostics.push(Diagnostic::cancelled("flow-deep-dive"));
                        break;
                    }
                    Err(e) if e.is_slice_recoverable() => {
                        warn!(flow_id = %flow.id, "flow action fetch failed: {e}");
                    }
                    Err(e) => return Err(e),
                }
            }
            for flow in &mut flows {
                if let Some(count) = action_counts.get(&flow.id) {
                    flow.email_action_count = *count;
                }
            }
        }

        Ok(flows)
    }

    async fn list_pipeline(&self) -> Result<Option<ListGrowth>> {
        if self.options.fast_mode || !self.options.include_enhanced {
            self.emit("lists", "skipping list growth (fast mode)");
            return Ok(None);
        }
        self.emit("lists", "selecting primary list and querying growth");
        match self.lists.get_list_growth(None, 6).await {
            Ok(growth) => Ok(growth),
            Err(e) => {
                self.recover::<()>("list-growth", e)?;
                Ok(None)
            }
        }
    }

    async fn form_pipeline(&self, window: &DateWindow) -> Result<Vec<FormSummary>> {
        if self.options.fast_mode || !self.options.include_enhanced {
            self.emit("forms", "skipping form performance (fast mode)");
            return Ok(Vec::new());
        }
        self.emit("forms", "querying form performance");
        match self.forms.get_form_performance(window).await {
            Ok(forms) => Ok(crate::diagnostics::dedupe_forms(forms)),
            Err(e) => {
                self.recover::<()>("forms", e)?;
                Ok(Vec::new())
            }
        }
    }

    /// Aggregate campaign statistics with benchmark classification
    fn campaign_overview(
        &self,
        campaigns: &[CampaignSummary],
        revenue: &RevenueAnalysis,
        days: i64,
    ) -> CampaignOverview {
        let mut statistics = EntityStatistics::default();
        let mut campaign_count = 0usize;
        for campaign in campaigns {
            if campaign.statistics.recipients > 0 {
                statistics.absorb(&campaign.statistics);
                campaign_count += 1;
            }
        }

        let total_revenue = revenue
            .snapshot
            .as_ref()
            .map(|s| s.campaign_revenue)
            .unwrap_or_else(|| campaigns.iter().map(|c| c.statistics.conversion_value).sum());

        let months = (days / 30).max(1) as usize;
        let benchmark = self.benchmarks.campaign();
        let classify = |observed: f64, reference: f64| {
            (campaign_count > 0).then(|| BenchmarkStatus::classify(observed, reference))
        };

        CampaignOverview {
            campaigns_per_month: campaigns.len() / months,
            open_rate_vs_benchmark: classify(statistics.open_rate, benchmark.open_rate),
            click_rate_vs_benchmark: classify(statistics.click_rate, benchmark.click_rate),
            conversion_rate_vs_benchmark: classify(
                statistics.conversion_rate,
                benchmark.conversion_rate,
            ),
            statistics,
            campaign_count,
            total_revenue,
        }
    }

    /// Convert a slice-level failure into a diagnostic; cancellation also
    /// yields a diagnostic so partial results flow through, while
    /// validation and configuration errors bubble.
    fn recover<T: Default>(&self, section: &'static str, error: AuditError) -> Result<T> {
        match error {
            AuditError::Cancelled => {
                self.diagnostics.push(Diagnostic::cancelled(section));
                Ok(T::default())
            }
            e if e.is_slice_recoverable() => {
                warn!(section, "sub-pipeline failed, continuing: {e}");
                self.diagnostics.push(
                    Diagnostic::parse_incomplete(section).with_evidence("error", e.to_string()),
                );
                Ok(T::default())
            }
            e => Err(e),
        }
    }

    fn emit(&self, section: &'static str, message: &str) {
        if self.options.verbose_progress {
            info!(section, "{message}");
        }
        if let Some(sender) = &self.options.progress {
            let _ = sender.send(ProgressEvent {
                section,
                message: message.to_string(),
            });
        }
    }
}

/// Extract a full audit bundle for one account. This is the primary entry
/// point of the crate.
pub async fn extract_audit(api_key: &str, options: AuditOptions) -> Result<AuditBundle> {
    let config = ClientConfig::new(api_key);
    AuditOrchestrator::new(config, options)?.run().await
}
