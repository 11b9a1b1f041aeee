//! Classification of flow-ecosystem, campaign, and form findings against
//! the benchmark table

pub mod campaigns;
pub mod flows;
pub mod forms;

pub use campaigns::{
    analyze_deliverability, campaign_diagnostics, diagnose_pattern, CampaignPattern,
    DeliverabilityIssue, PatternDiagnosis,
};
pub use flows::{
    analyze_flow_ecosystem, identify, identify_core_flows, FlowType, REQUIRED_FLOW_TYPES,
};
pub use forms::{categorize, dedupe_forms, form_diagnostics, primary_table, FormCategory};
