//! Provider-facing entity summaries used throughout the audit

use serde::{Deserialize, Serialize};

use super::statistics::EntityStatistics;

/// A metric reference as listed by GET /metrics/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRef {
    pub id: String,
    pub name: String,
    /// Integration key (e.g. "shopify", "api"), lowercase when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration_name: Option<String>,
}

/// Lifecycle status reported on a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Live,
    Draft,
    Archived,
    Manual,
    Unknown,
}

impl FlowStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "live" => FlowStatus::Live,
            "draft" => FlowStatus::Draft,
            "archived" => FlowStatus::Archived,
            "manual" => FlowStatus::Manual,
            _ => FlowStatus::Unknown,
        }
    }
}

/// One automated flow with stats aggregated across its messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub id: String,
    pub name: String,
    pub status: FlowStatus,
    /// Number of EMAIL actions in the flow
    pub email_action_count: usize,
    /// Counts summed across messages, rates recomputed post-aggregation
    pub statistics: EntityStatistics,
}

/// Message channel of a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
        }
    }
}

/// A one-off broadcast campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    pub channel: Channel,
    /// Canonical ISO instant the campaign was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    #[serde(default)]
    pub statistics: EntityStatistics,
}

/// A subscriber list with its selection priority
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub id: String,
    pub name: String,
    pub profile_count: u64,
    /// Classifier output used only for primary-list selection
    pub priority: u32,
}

/// Form display type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormKind {
    Popup,
    Flyout,
    Embed,
    FullPage,
    Other,
}

impl FormKind {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "popup" => FormKind::Popup,
            "flyout" => FormKind::Flyout,
            "embed" => FormKind::Embed,
            "full_page" | "fullpage" => FormKind::FullPage,
            _ => FormKind::Other,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FormKind::Popup => "Popup",
            FormKind::Flyout => "Flyout",
            FormKind::Embed => "Embed",
            FormKind::FullPage => "Full Page",
            FormKind::Other => "Other",
        }
    }
}

/// Qualitative standing of a form against type-specific thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStanding {
    Excellent,
    Good,
    Average,
    Poor,
    None,
}

/// A signup form with window-scoped performance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub id: String,
    pub name: String,
    pub kind: FormKind,
    pub impressions: u64,
    pub submissions: u64,
    /// Percent, 0-100
    pub submit_rate: f64,
    pub standing: FormStanding,
}
