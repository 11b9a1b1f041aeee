//! Flow-type identification and flow-ecosystem checks

use std::collections::{HashMap, HashSet};

use serde_json::json;

use crate::domain::diagnostic::{Diagnostic, DiagnosticKind, Severity};
use crate::domain::entities::{FlowSummary, FlowStatus};

/// The automation archetypes the audit recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowType {
    WelcomeSeries,
    BrowseAbandonment,
    AbandonedCheckout,
    AbandonedCart,
    PostPurchase,
    BackInStock,
    Winback,
}

impl FlowType {
    pub fn display_name(&self) -> &'static str {
        match self {
            FlowType::WelcomeSeries => "Welcome Series",
            FlowType::BrowseAbandonment => "Browse Abandonment",
            FlowType::AbandonedCheckout => "Abandoned Checkout",
            FlowType::AbandonedCart => "Abandoned Cart",
            FlowType::PostPurchase => "Post Purchase",
            FlowType::BackInStock => "Back in Stock",
            FlowType::Winback => "Winback",
        }
    }

    /// Benchmark table key
    pub fn key(&self) -> &'static str {
        match self {
            FlowType::WelcomeSeries => "welcome_series",
            FlowType::BrowseAbandonment => "browse_abandonment",
            FlowType::AbandonedCheckout => "abandoned_checkout",
            FlowType::AbandonedCart => "abandoned_cart",
            FlowType::PostPurchase => "post_purchase",
            FlowType::BackInStock => "back_in_stock",
            FlowType::Winback => "winback",
        }
    }
}

/// The archetypes every e-commerce account is expected to run. An
/// abandoned-checkout flow satisfies the abandoned-cart requirement.
pub const REQUIRED_FLOW_TYPES: &[FlowType] = &[
    FlowType::WelcomeSeries,
    FlowType::AbandonedCart,
    FlowType::BrowseAbandonment,
    FlowType::PostPurchase,
];

/// Name fragments per type, checked after the more-specific rules below
const NAME_PATTERNS: &[(FlowType, &[&str])] = &[
    (
        FlowType::WelcomeSeries,
        &["welcome", "nurture", "onboard", "new customer", "first time", "ns-", "-ns-"],
    ),
    (
        FlowType::AbandonedCart,
        &["abandon", "cart", "add to cart", "atc-", "-atc-"],
    ),
    (
        FlowType::PostPurchase,
        &["post", "purchase", "thank", "order confirm", "pp-", "-pp-", "fpf", "first-to-second"],
    ),
    (
        FlowType::BackInStock,
        &["back in stock", "restock", "back-in-stock", "bis-", "-bis-", "inventory"],
    ),
    (
        FlowType::Winback,
        &["winback", "win back", "lapsed", "re-engage", "lc-", "-lc-", "customer"],
    ),
];

/// Identify a flow archetype from its name.
///
/// Browse abandonment is matched before cart (more specific), and checkout
/// abandonment before cart whenever "checkout" or the checkout prefixes
/// appear; the remaining patterns are tried in a fixed order.
pub fn identify(flow_name: &str) -> Option<FlowType> {
    let name = flow_name.to_ascii_lowercase();

    if (name.contains("browse") && name.contains("abandon"))
        || name.starts_with("ba-")
        || name.contains("-ba-")
    {
        return Some(FlowType::BrowseAbandonment);
    }

    if (name.contains("checkout") && name.contains("abandon"))
        || (name.starts_with("as-") && name.contains("abandon"))
        || name.starts_with("ac-")
        || (name.contains("-as-") && name.contains("abandon"))
    {
        return Some(FlowType::AbandonedCheckout);
    }

    for (flow_type, patterns) in NAME_PATTERNS {
        if patterns.iter().any(|p| name.contains(p)) {
            return Some(*flow_type);
        }
    }
    None
}

/// Map flows to archetypes, preferring the live flow when several match the
/// same type.
pub fn identify_core_flows(flows: &[FlowSummary]) -> HashMap<FlowType, FlowSummary> {
    let mut identified: HashMap<FlowType, FlowSummary> = HashMap::new();
    for flow in flows {
        let Some(flow_type) = identify(&flow.name) else {
            continue;
        };
        match identified.get(&flow_type) {
            Some(existing) if existing.status == FlowStatus::Live => {}
            _ => {
                if flow.status == FlowStatus::Live || !identified.contains_key(&flow_type) {
                    identified.insert(flow_type, flow.clone());
                }
            }
        }
    }
    identified
}

/// Severity of a missing required flow
fn missing_severity(flow_type: FlowType) -> Severity {
    match flow_type {
        FlowType::AbandonedCart | FlowType::PostPurchase => Severity::High,
        _ => Severity::Medium,
    }
}

/// Classify the flow ecosystem: missing required flows, duplicate live
/// flows, live flows with zero deliveries, and data anomalies.
pub fn analyze_flow_ecosystem(flows: &[FlowSummary]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let mut live_by_type: HashMap<FlowType, Vec<&FlowSummary>> = HashMap::new();
    let mut covered: HashSet<FlowType> = HashSet::new();
    for flow in flows {
        if let Some(flow_type) = identify(&flow.name) {
            covered.insert(flow_type);
            if flow.status == FlowStatus::Live {
                live_by_type.entry(flow_type).or_default().push(flow);
            }
        }
    }

    for required in REQUIRED_FLOW_TYPES {
        let satisfied = match required {
            // Checkout abandonment covers the cart requirement
            FlowType::AbandonedCart => {
                covered.contains(&FlowType::AbandonedCart)
                    || covered.contains(&FlowType::AbandonedCheckout)
            }
            other => covered.contains(other),
        };
        if !satisfied {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::MissingFlow,
                    missing_severity(*required),
                    format!(
                        "No {} flow was found; building one is a proven revenue lever",
                        required.display_name()
                    ),
                )
                .with_evidence("flowType", required.key()),
            );
        }
    }

    for (flow_type, live_flows) in &live_by_type {
        if live_flows.len() >= 2 {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DuplicateFlow,
                    Severity::Medium,
                    format!(
                        "{} live flows map to {}; consolidate to avoid competing sends",
                        live_flows.len(),
                        flow_type.display_name()
                    ),
                )
                .with_evidence("flowType", flow_type.key())
                .with_evidence(
                    "flows",
                    json!(live_flows.iter().map(|f| f.name.clone()).collect::<Vec<_>>()),
                ),
            );
        }
    }

    for flow in flows {
        if flow.status == FlowStatus::Live && flow.statistics.recipients == 0 {
            if flow.statistics.is_anomalous() {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DataAnomaly,
                        Severity::High,
                        format!(
                            "Flow '{}' reports engagement with zero recipients; treat its metrics as unreliable",
                            flow.name
                        ),
                    )
                    .with_evidence("flowId", flow.id.clone())
                    .with_evidence("conversions", flow.statistics.conversions)
                    .with_evidence("opens", flow.statistics.opens),
                );
            } else {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::ZeroDeliveries,
                        Severity::Critical,
                        format!(
                            "Live flow '{}' delivered to nobody in the window; check its trigger and filters",
                            flow.name
                        ),
                    )
                    .with_evidence("flowId", flow.id.clone()),
                );
            }
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::statistics::EntityStatistics;

    fn flow(id: &str, name: &str, status: FlowStatus, recipients: u64) -> FlowSummary {
        FlowSummary {
            id: id.to_string(),
            name: name.to_string(),
            status,
            email_action_count: 1,
            statistics: EntityStatistics {
                recipients,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_browse_before_cart() {
        assert_eq!(identify("Browse Abandonment"), Some(FlowType::BrowseAbandonment));
        assert_eq!(identify("BA- Product Viewers"), Some(FlowType::BrowseAbandonment));
    }

    #[test]
    fn test_checkout_before_cart() {
        assert_eq!(
            identify("Abandoned Checkout Recovery"),
            Some(FlowType::AbandonedCheckout)
        );
        assert_eq!(identify("AC- Checkout"), Some(FlowType::AbandonedCheckout));
        assert_eq!(identify("Abandoned Cart"), Some(FlowType::AbandonedCart));
    }

    #[test]
    fn test_short_prefixes() {
        assert_eq!(identify("NS- New Subscribers"), Some(FlowType::WelcomeSeries));
        assert_eq!(identify("ATC- Recovery"), Some(FlowType::AbandonedCart));
        assert_eq!(identify("PP- Thank You"), Some(FlowType::PostPurchase));
        assert_eq!(identify("BIS- Notify"), Some(FlowType::BackInStock));
    }

    #[test]
    fn test_unrecognized_name() {
        assert_eq!(identify("Weekly Digest"), None);
    }

    #[test]
    fn test_missing_flows_scenario() {
        // Only a welcome flow exists: expect cart (high), browse (medium),
        // post purchase (high) missing
        let flows = vec![flow("F1", "Welcome Series", FlowStatus::Live, 100)];
        let diagnostics = analyze_flow_ecosystem(&flows);

        let missing: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::MissingFlow)
            .collect();
        assert_eq!(missing.len(), 3);

        let severity_of = |key: &str| {
            missing
                .iter()
                .find(|d| d.evidence["flowType"] == key)
                .map(|d| d.severity)
        };
        assert_eq!(severity_of("abandoned_cart"), Some(Severity::High));
        assert_eq!(severity_of("browse_abandonment"), Some(Severity::Medium));
        assert_eq!(severity_of("post_purchase"), Some(Severity::High));
    }

    #[test]
    fn test_checkout_satisfies_cart_requirement() {
        let flows = vec![
            flow("F1", "Welcome Series", FlowStatus::Live, 10),
            flow("F2", "Abandoned Checkout", FlowStatus::Live, 10),
            flow("F3", "Browse Abandonment", FlowStatus::Live, 10),
            flow("F4", "Post Purchase", FlowStatus::Live, 10),
        ];
        let diagnostics = analyze_flow_ecosystem(&flows);
        assert!(!diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MissingFlow));
    }

    #[test]
    fn test_duplicate_live_flows() {
        let flows = vec![
            flow("F1", "Welcome Series", FlowStatus::Live, 10),
            flow("F2", "Welcome New Customers", FlowStatus::Live, 10),
        ];
        let diagnostics = analyze_flow_ecosystem(&flows);
        assert!(diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DuplicateFlow));
    }

    #[test]
    fn test_zero_delivery_is_critical() {
        let flows = vec![flow("F1", "Welcome Series", FlowStatus::Live, 0)];
        let diagnostics = analyze_flow_ecosystem(&flows);
        let zero = diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::ZeroDeliveries)
            .unwrap();
        assert_eq!(zero.severity, Severity::Critical);
    }

    #[test]
    fn test_anomaly_replaces_zero_delivery() {
        let mut anomalous = flow("F1", "Welcome Series", FlowStatus::Live, 0);
        anomalous.statistics.conversions = 4;
        let diagnostics = analyze_flow_ecosystem(&[anomalous]);
        assert!(diagnostics.iter().any(|d| d.kind == DiagnosticKind::DataAnomaly));
        assert!(!diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ZeroDeliveries));
    }

    #[test]
    fn test_core_flow_identification_prefers_live() {
        let flows = vec![
            flow("F1", "Welcome Series (old)", FlowStatus::Draft, 0),
            flow("F2", "Welcome Series", FlowStatus::Live, 10),
        ];
        let core = identify_core_flows(&flows);
        assert_eq!(core[&FlowType::WelcomeSeries].id, "F2");
    }
}
