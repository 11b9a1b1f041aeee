// Benchmark-driven classification scenarios

use klaviyo_audit::benchmarks::Benchmarks;
use klaviyo_audit::diagnostics::{
    analyze_flow_ecosystem, campaign_diagnostics, categorize, diagnose_pattern, primary_table,
    CampaignPattern, FormCategory,
};
use klaviyo_audit::domain::diagnostic::{DiagnosticKind, Severity};
use klaviyo_audit::domain::entities::{
    FlowStatus, FlowSummary, FormKind, FormStanding, FormSummary,
};
use klaviyo_audit::domain::EntityStatistics;

fn live_flow(id: &str, name: &str, recipients: u64) -> FlowSummary {
    FlowSummary {
        id: id.to_string(),
        name: name.to_string(),
        status: FlowStatus::Live,
        email_action_count: 2,
        statistics: EntityStatistics {
            recipients,
            ..Default::default()
        },
    }
}

#[test]
fn test_campaign_pattern_against_apparel_benchmarks() {
    // Open 45% vs 44.5%, click 1.0% vs 1.66% -> content fatigue pattern
    let benchmarks = Benchmarks::new("apparel_accessories");
    let campaign = benchmarks.campaign();
    let diagnosis = diagnose_pattern(45.0, 1.0, campaign.open_rate, campaign.click_rate);
    assert_eq!(diagnosis.pattern, CampaignPattern::HighOpenLowClick);
}

#[test]
fn test_missing_flow_scenario() {
    // Only a welcome flow present
    let flows = vec![live_flow("F1", "Welcome Series", 500)];
    let diagnostics = analyze_flow_ecosystem(&flows);

    let missing: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::MissingFlow)
        .collect();
    assert_eq!(missing.len(), 3);

    let find = |key: &str| missing.iter().find(|d| d.evidence["flowType"] == key);
    assert_eq!(find("abandoned_cart").unwrap().severity, Severity::High);
    assert_eq!(
        find("browse_abandonment").unwrap().severity,
        Severity::Medium
    );
    assert_eq!(find("post_purchase").unwrap().severity, Severity::High);
}

#[test]
fn test_full_ecosystem_is_quiet() {
    let flows = vec![
        live_flow("F1", "Welcome Series", 500),
        live_flow("F2", "ATC- Abandoned Cart", 300),
        live_flow("F3", "Browse Abandonment", 200),
        live_flow("F4", "PP- Post Purchase", 150),
    ];
    assert!(analyze_flow_ecosystem(&flows).is_empty());
}

#[test]
fn test_segmentation_recommended_for_poor_deliverability() {
    let benchmarks = Benchmarks::new("apparel_accessories");
    let stats = EntityStatistics {
        open_rate: 46.0,
        click_rate: 1.7,
        spam_complaint_rate: 0.05,
        ..Default::default()
    };

    let diagnostics = campaign_diagnostics(&stats, &benchmarks);
    assert!(diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::DeliverabilityIssue));
    let segmentation = diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::SegmentationNeeded)
        .expect("segmentation recommendation expected");

    let tracks = segmentation.evidence["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 5);
    assert!(tracks[0]["name"].as_str().unwrap().contains("Highly Engaged"));
}

#[test]
fn test_form_categorization_and_primary_table() {
    let forms = vec![
        FormSummary {
            id: "W1".to_string(),
            name: "Popup".to_string(),
            kind: FormKind::Popup,
            impressions: 10_000,
            submissions: 650,
            submit_rate: 6.5,
            standing: FormStanding::Good,
        },
        FormSummary {
            id: "W2".to_string(),
            name: "Footer Embed".to_string(),
            kind: FormKind::Embed,
            impressions: 5_000,
            submissions: 40,
            submit_rate: 0.8,
            standing: FormStanding::Good,
        },
        FormSummary {
            id: "W3".to_string(),
            name: "Retired".to_string(),
            kind: FormKind::Popup,
            impressions: 0,
            submissions: 0,
            submit_rate: 0.0,
            standing: FormStanding::None,
        },
    ];

    assert_eq!(categorize(&forms[0]), FormCategory::HighPerformer);
    assert_eq!(categorize(&forms[1]), FormCategory::Underperformer);
    assert_eq!(categorize(&forms[2]), FormCategory::Inactive);
    assert_eq!(primary_table(&forms).len(), 2);
}
