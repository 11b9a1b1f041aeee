//! Form standing and categorization

use std::collections::HashSet;

use crate::domain::diagnostic::{Diagnostic, DiagnosticKind, Severity};
use crate::domain::entities::{FormKind, FormStanding, FormSummary};

/// Performance category used by the data-capture section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormCategory {
    HighPerformer,
    Underperformer,
    Inactive,
    Typical,
}

/// Standing thresholds differ by form type: popups convert far better than
/// embeds, so the same rate reads differently.
pub fn standing_for(kind: FormKind, submit_rate: f64) -> FormStanding {
    match kind {
        FormKind::Popup => {
            if submit_rate >= 8.0 {
                FormStanding::Excellent
            } else if submit_rate >= 3.0 {
                FormStanding::Good
            } else if submit_rate >= 1.0 {
                FormStanding::Average
            } else {
                FormStanding::Poor
            }
        }
        _ => {
            if submit_rate >= 2.0 {
                FormStanding::Excellent
            } else if submit_rate >= 0.5 {
                FormStanding::Good
            } else if submit_rate >= 0.1 {
                FormStanding::Average
            } else {
                FormStanding::Poor
            }
        }
    }
}

/// Categorize a form: >= 5% submit rate is a high performer, < 3% with real
/// traffic an underperformer, zero impressions inactive.
pub fn categorize(form: &FormSummary) -> FormCategory {
    if form.impressions == 0 {
        FormCategory::Inactive
    } else if form.submit_rate >= 5.0 {
        FormCategory::HighPerformer
    } else if form.submit_rate < 3.0 && form.impressions > 100 {
        FormCategory::Underperformer
    } else {
        FormCategory::Typical
    }
}

/// Deduplicate by id, then by exact name for id-less rows
pub fn dedupe_forms(forms: Vec<FormSummary>) -> Vec<FormSummary> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut deduped = Vec::with_capacity(forms.len());

    for form in forms {
        if !form.id.is_empty() {
            if !seen_ids.insert(form.id.clone()) {
                continue;
            }
        } else if !seen_names.insert(form.name.clone()) {
            continue;
        }
        deduped.push(form);
    }
    deduped
}

/// The primary table shows only forms that actually served impressions
pub fn primary_table(forms: &[FormSummary]) -> Vec<FormSummary> {
    forms
        .iter()
        .filter(|form| form.impressions > 0)
        .cloned()
        .collect()
}

/// One diagnostic per underperforming form
pub fn form_diagnostics(forms: &[FormSummary]) -> Vec<Diagnostic> {
    forms
        .iter()
        .filter(|form| categorize(form) == FormCategory::Underperformer)
        .map(|form| {
            Diagnostic::new(
                DiagnosticKind::FormUnderperformer,
                Severity::Medium,
                format!(
                    "Form '{}' converts {:.2}% of {} impressions; test timing, offer, and field count",
                    form.name, form.submit_rate, form.impressions
                ),
            )
            .with_evidence("formId", form.id.clone())
            .with_evidence("submitRate", form.submit_rate)
            .with_evidence("impressions", form.impressions)
        })
        .collect()
}
