//! Industry benchmark reference table
//!
//! In-memory only, constructed once at startup, no I/O. Values come from
//! aggregated e-commerce email benchmarks for the supported industries;
//! unknown industry keys fall back to the default tier.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::diagnostics::flows::FlowType;

/// Default industry key
pub const DEFAULT_INDUSTRY: &str = "apparel_accessories";

/// Campaign reference rates, percent (revenue per recipient in currency)
#[derive(Debug, Clone, Copy)]
pub struct CampaignBenchmark {
    pub open_rate: f64,
    pub click_rate: f64,
    pub conversion_rate: f64,
    pub revenue_per_recipient: f64,
}

/// Flow reference rates, percent; top-10% figures alongside the averages
#[derive(Debug, Clone, Copy)]
pub struct FlowBenchmark {
    pub open_rate_avg: f64,
    pub open_rate_top10: f64,
    pub click_rate_avg: f64,
    pub click_rate_top10: f64,
    pub conversion_rate_avg: f64,
}

/// Deliverability thresholds, percent; crossing one flags the account
#[derive(Debug, Clone, Copy)]
pub struct DeliverabilityThresholds {
    pub spam_complaint_rate: f64,
    pub unsubscribe_rate: f64,
    pub bounce_rate: f64,
}

/// One engagement track of the five-track segmentation model
#[derive(Debug, Clone, Copy)]
pub struct SegmentationTrack {
    pub name: &'static str,
    pub criteria: &'static str,
    pub cadence: &'static str,
    pub typical_percentage: u32,
}

static CAMPAIGN_BENCHMARKS: Lazy<HashMap<&'static str, CampaignBenchmark>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(
        "apparel_accessories",
        CampaignBenchmark {
            open_rate: 44.50,
            click_rate: 1.66,
            conversion_rate: 0.07,
            revenue_per_recipient: 0.09,
        },
    );
    table.insert(
        "default",
        CampaignBenchmark {
            open_rate: 42.00,
            click_rate: 1.50,
            conversion_rate: 0.08,
            revenue_per_recipient: 0.10,
        },
    );
    table
});

static FLOW_BENCHMARKS: Lazy<HashMap<&'static str, FlowBenchmark>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(
        "welcome_series",
        FlowBenchmark {
            open_rate_avg: 51.52,
            open_rate_top10: 74.64,
            click_rate_avg: 4.55,
            click_rate_top10: 14.81,
            conversion_rate_avg: 2.00,
        },
    );
    table.insert(
        "abandoned_cart",
        FlowBenchmark {
            open_rate_avg: 51.43,
            open_rate_top10: 66.67,
            click_rate_avg: 6.25,
            click_rate_top10: 10.5,
            conversion_rate_avg: 3.42,
        },
    );
    table.insert(
        "abandoned_checkout",
        FlowBenchmark {
            open_rate_avg: 51.43,
            open_rate_top10: 66.67,
            click_rate_avg: 6.25,
            click_rate_top10: 10.5,
            conversion_rate_avg: 4.12,
        },
    );
    table.insert(
        "browse_abandonment",
        FlowBenchmark {
            open_rate_avg: 54.10,
            open_rate_top10: 65.0,
            click_rate_avg: 4.74,
            click_rate_top10: 7.5,
            conversion_rate_avg: 0.82,
        },
    );
    table.insert(
        "post_purchase",
        FlowBenchmark {
            open_rate_avg: 60.09,
            open_rate_top10: 75.0,
            click_rate_avg: 3.33,
            click_rate_top10: 6.0,
            conversion_rate_avg: 0.52,
        },
    );
    table
});

static SEGMENTATION_TRACKS: [SegmentationTrack; 5] = [
    SegmentationTrack {
        name: "Track A: Highly Engaged",
        criteria: "Opened or clicked in last 30 days",
        cadence: "Daily",
        typical_percentage: 15,
    },
    SegmentationTrack {
        name: "Track B: Moderately Engaged",
        criteria: "Opened or clicked in last 60 days (not in Track A)",
        cadence: "2-3x/week",
        typical_percentage: 25,
    },
    SegmentationTrack {
        name: "Track C: Broad Engaged",
        criteria: "Opened or clicked in last 90 days (not in A or B)",
        cadence: "1x/week",
        typical_percentage: 20,
    },
    SegmentationTrack {
        name: "Track D: Unengaged",
        criteria: "No engagement in 90+ days",
        cadence: "Goes through Sunset Flow then suppressed if still unengaged",
        typical_percentage: 30,
    },
    SegmentationTrack {
        name: "Track E: For Suppression",
        criteria: "Hard bounces, spam complaints, unsubscribes",
        cadence: "Do not send. Needs to be suppressed",
        typical_percentage: 10,
    },
];

/// Read-only benchmark accessor bound to one industry key
#[derive(Debug, Clone)]
pub struct Benchmarks {
    industry: String,
}

impl Benchmarks {
    pub fn new(industry: impl Into<String>) -> Self {
        let industry = industry.into();
        let industry = if industry.trim().is_empty() {
            DEFAULT_INDUSTRY.to_string()
        } else {
            industry
        };
        Self { industry }
    }

    pub fn industry(&self) -> &str {
        &self.industry
    }

    /// Campaign reference rates for the bound industry, default tier when
    /// the key is unknown
    pub fn campaign(&self) -> CampaignBenchmark {
        CAMPAIGN_BENCHMARKS
            .get(self.industry.as_str())
            .or_else(|| CAMPAIGN_BENCHMARKS.get("default"))
            .copied()
            .expect("default campaign benchmark exists")
    }

    /// Flow reference rates per archetype; None for archetypes without a
    /// published benchmark
    pub fn flow(&self, flow_type: FlowType) -> Option<FlowBenchmark> {
        FLOW_BENCHMARKS.get(flow_type.key()).copied()
    }

    pub fn deliverability(&self) -> DeliverabilityThresholds {
        DeliverabilityThresholds {
            spam_complaint_rate: 0.02,
            unsubscribe_rate: 0.15,
            bounce_rate: 0.50,
        }
    }

    /// The five-track engagement segmentation template
    pub fn segmentation_tracks() -> &'static [SegmentationTrack] {
        &SEGMENTATION_TRACKS
    }
}

impl Default for Benchmarks {
    fn default() -> Self {
        Self::new(DEFAULT_INDUSTRY)
    }
}
