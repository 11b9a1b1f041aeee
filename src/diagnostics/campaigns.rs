//! Campaign pattern diagnosis, deliverability analysis, and segmentation
//! recommendation

use serde_json::json;

use crate::benchmarks::Benchmarks;
use crate::domain::diagnostic::{Diagnostic, DiagnosticKind, Severity};
use crate::domain::statistics::EntityStatistics;

/// Recognized campaign performance patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignPattern {
    HighOpenLowClick,
    LowOpenHighClick,
    UnderperformingOverall,
    PerformingWell,
}

impl CampaignPattern {
    pub fn key(&self) -> &'static str {
        match self {
            CampaignPattern::HighOpenLowClick => "high_open_low_click",
            CampaignPattern::LowOpenHighClick => "low_open_high_click",
            CampaignPattern::UnderperformingOverall => "underperforming_overall",
            CampaignPattern::PerformingWell => "performing_well",
        }
    }
}

/// Pattern with its reading and urgency
#[derive(Debug, Clone)]
pub struct PatternDiagnosis {
    pub pattern: CampaignPattern,
    pub diagnosis: &'static str,
    pub root_cause: &'static str,
    pub severity: Severity,
}

/// Classify aggregate open/click rates against benchmarks.
///
/// High open + low click reads as content fatigue from batch-and-blast
/// sending; low open + high click as an engaged core dragged down by an
/// unengaged list; both below benchmark as fundamental issues.
pub fn diagnose_pattern(
    open_rate: f64,
    click_rate: f64,
    benchmark_open: f64,
    benchmark_click: f64,
) -> PatternDiagnosis {
    if open_rate >= benchmark_open * 0.9 && click_rate < benchmark_click * 0.7 {
        PatternDiagnosis {
            pattern: CampaignPattern::HighOpenLowClick,
            diagnosis: "Strong subject lines but content not resonating. Likely batch-and-blast to an unengaged list.",
            root_cause: "Missing engagement-based segmentation",
            severity: Severity::High,
        }
    } else if open_rate < benchmark_open * 0.8 && click_rate >= benchmark_click * 0.9 {
        PatternDiagnosis {
            pattern: CampaignPattern::LowOpenHighClick,
            diagnosis: "Engaged subscribers are highly engaged, but the list carries too many unengaged profiles dragging open rates down.",
            root_cause: "Over-sending to disengaged subscribers",
            severity: Severity::High,
        }
    } else if open_rate < benchmark_open * 0.8 && click_rate < benchmark_click * 0.7 {
        PatternDiagnosis {
            pattern: CampaignPattern::UnderperformingOverall,
            diagnosis: "Fundamental issues: list quality, deliverability, or content relevance.",
            root_cause: "Multiple issues requiring audit",
            severity: Severity::Critical,
        }
    } else {
        PatternDiagnosis {
            pattern: CampaignPattern::PerformingWell,
            diagnosis: "Campaign performance meets or exceeds benchmarks.",
            root_cause: "No significant issues identified",
            severity: Severity::Low,
        }
    }
}

/// One deliverability metric over its threshold
#[derive(Debug, Clone)]
pub struct DeliverabilityIssue {
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
    pub diagnosis: &'static str,
    pub recommendation: &'static str,
}

/// Flag deliverability metrics over their thresholds: spam complaints above
/// 0.02%, unsubscribes above 0.15%, bounces above 0.50%.
pub fn analyze_deliverability(
    statistics: &EntityStatistics,
    benchmarks: &Benchmarks,
) -> Vec<DeliverabilityIssue> {
    let thresholds = benchmarks.deliverability();
    let mut issues = Vec::new();

    if statistics.spam_complaint_rate > thresholds.spam_complaint_rate {
        issues.push(DeliverabilityIssue {
            metric: "spam_complaint_rate",
            value: statistics.spam_complaint_rate,
            threshold: thresholds.spam_complaint_rate,
            diagnosis: "High spam complaints indicate sending frequency or content relevance issues, usually from mixing engaged and unengaged segments.",
            recommendation: "Implement engagement-based segmentation immediately",
        });
    }
    if statistics.unsubscribe_rate > thresholds.unsubscribe_rate {
        issues.push(DeliverabilityIssue {
            metric: "unsubscribe_rate",
            value: statistics.unsubscribe_rate,
            threshold: thresholds.unsubscribe_rate,
            diagnosis: "High unsubscribe rate suggests list quality issues or over-sending.",
            recommendation: "Review sending frequency and segment unengaged subscribers",
        });
    }
    if statistics.bounce_rate > thresholds.bounce_rate {
        issues.push(DeliverabilityIssue {
            metric: "bounce_rate",
            value: statistics.bounce_rate,
            threshold: thresholds.bounce_rate,
            diagnosis: "High bounce rate indicates list hygiene problems.",
            recommendation: "Run a list hygiene audit and a sunset flow",
        });
    }

    issues
}

/// Full campaign diagnosis: pattern finding, deliverability findings, and a
/// segmentation recommendation when either warrants one.
pub fn campaign_diagnostics(
    statistics: &EntityStatistics,
    benchmarks: &Benchmarks,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let campaign_bench = benchmarks.campaign();
    let pattern = diagnose_pattern(
        statistics.open_rate,
        statistics.click_rate,
        campaign_bench.open_rate,
        campaign_bench.click_rate,
    );

    if pattern.pattern != CampaignPattern::PerformingWell {
        diagnostics.push(
            Diagnostic::new(DiagnosticKind::CampaignPattern, pattern.severity, pattern.diagnosis)
                .with_evidence("pattern", pattern.pattern.key())
                .with_evidence("rootCause", pattern.root_cause)
                .with_evidence("openRate", statistics.open_rate)
                .with_evidence("clickRate", statistics.click_rate)
                .with_evidence("benchmarkOpenRate", campaign_bench.open_rate)
                .with_evidence("benchmarkClickRate", campaign_bench.click_rate),
        );
    }

    let issues = analyze_deliverability(statistics, benchmarks);
    for issue in &issues {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::DeliverabilityIssue,
                Severity::High,
                issue.recommendation,
            )
            .with_evidence("metric", issue.metric)
            .with_evidence("value", issue.value)
            .with_evidence("threshold", issue.threshold)
            .with_evidence("diagnosis", issue.diagnosis),
        );
    }

    let needs_segmentation = !issues.is_empty()
        || matches!(
            pattern.pattern,
            CampaignPattern::HighOpenLowClick | CampaignPattern::LowOpenHighClick
        );
    if needs_segmentation {
        let tracks: Vec<_> = Benchmarks::segmentation_tracks()
            .iter()
            .map(|track| {
                json!({
                    "name": track.name,
                    "criteria": track.criteria,
                    "cadence": track.cadence,
                    "typicalPercentage": track.typical_percentage,
                })
            })
            .collect();
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::SegmentationNeeded,
                Severity::High,
                "Campaign performance and deliverability metrics indicate engagement-based segmentation is required",
            )
            .with_evidence("tracks", json!(tracks)),
        );
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_open_low_click() {
        // Open 45% vs benchmark 44.5%, click 1.0% vs benchmark 1.66%
        let diagnosis = diagnose_pattern(45.0, 1.0, 44.5, 1.66);
        assert_eq!(diagnosis.pattern, CampaignPattern::HighOpenLowClick);
        assert_eq!(diagnosis.severity, Severity::High);
    }

    #[test]
    fn test_low_open_high_click() {
        let diagnosis = diagnose_pattern(30.0, 1.6, 44.5, 1.66);
        assert_eq!(diagnosis.pattern, CampaignPattern::LowOpenHighClick);
    }

    #[test]
    fn test_underperforming_overall_is_critical() {
        let diagnosis = diagnose_pattern(20.0, 0.5, 44.5, 1.66);
        assert_eq!(diagnosis.pattern, CampaignPattern::UnderperformingOverall);
        assert_eq!(diagnosis.severity, Severity::Critical);
    }

    #[test]
    fn test_performing_well() {
        let diagnosis = diagnose_pattern(46.0, 1.7, 44.5, 1.66);
        assert_eq!(diagnosis.pattern, CampaignPattern::PerformingWell);
    }

    #[test]
    fn test_deliverability_thresholds() {
        let benchmarks = Benchmarks::new("apparel_accessories");
        let stats = EntityStatistics {
            spam_complaint_rate: 0.03,
            unsubscribe_rate: 0.10,
            bounce_rate: 0.80,
            ..Default::default()
        };
        let issues = analyze_deliverability(&stats, &benchmarks);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.metric == "spam_complaint_rate"));
        assert!(issues.iter().any(|i| i.metric == "bounce_rate"));
    }

    #[test]
    fn test_segmentation_recommended_for_pattern() {
        let benchmarks = Benchmarks::new("apparel_accessories");
        let stats = EntityStatistics {
            open_rate: 45.0,
            click_rate: 1.0,
            ..Default::default()
        };
        let diagnostics = campaign_diagnostics(&stats, &benchmarks);
        let segmentation = diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::SegmentationNeeded)
            .expect("segmentation diagnostic expected");
        assert_eq!(segmentation.evidence["tracks"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_no_diagnostics_when_healthy() {
        let benchmarks = Benchmarks::new("apparel_accessories");
        let stats = EntityStatistics {
            open_rate: 46.0,
            click_rate: 1.7,
            spam_complaint_rate: 0.01,
            unsubscribe_rate: 0.05,
            bounce_rate: 0.2,
            ..Default::default()
        };
        assert!(campaign_diagnostics(&stats, &benchmarks).is_empty());
    }
}
