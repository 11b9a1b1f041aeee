//! Derived, stateless diagnostics attached to the audit bundle

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    MissingFlow,
    DuplicateFlow,
    ZeroDeliveries,
    DeliverabilityIssue,
    CampaignPattern,
    SegmentationNeeded,
    FormUnderperformer,
    DataAnomaly,
    ParseIncomplete,
    BatchFailure,
    MissingConversionMetric,
    Cancelled,
}

/// How urgently a diagnostic needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One finding. Diagnostics are values: they carry no identity and are
/// never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Structured supporting data for the finding
    #[serde(default)]
    pub evidence: Map<String, Value>,
    pub recommendation: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, severity: Severity, recommendation: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            evidence: Map::new(),
            recommendation: recommendation.into(),
        }
    }

    /// Attach one evidence entry
    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }

    pub fn parse_incomplete(context: impl Into<String>) -> Self {
        Diagnostic::new(
            DiagnosticKind::ParseIncomplete,
            Severity::Low,
            "A provider payload could not be fully parsed; the affected slice is reported as empty",
        )
        .with_evidence("context", context.into())
    }

    pub fn cancelled(section: impl Into<String>) -> Self {
        Diagnostic::new(
            DiagnosticKind::Cancelled,
            Severity::Medium,
            "Extraction was cancelled; results for this section are partial",
        )
        .with_evidence("section", section.into())
    }
}

/// Shared, append-only collector threaded through the sub-pipelines.
///
/// Cloning is cheap; all clones feed the same list, which the orchestrator
/// drains into the final bundle.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.lock().expect("diagnostic log poisoned").push(diagnostic);
    }

    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        let mut entries = self.entries.lock().expect("diagnostic log poisoned");
        entries.extend(diagnostics);
    }

    /// Take everything collected so far
    pub fn drain(&self) -> Vec<Diagnostic> {
        let mut entries = self.entries.lock().expect("diagnostic log poisoned");
        std::mem::take(&mut *entries)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("diagnostic log poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
