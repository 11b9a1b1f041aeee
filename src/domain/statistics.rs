//! Canonical per-entity statistics with percent-normalized rates
//!
//! The reporting API returns rates in decimal form (0.0-1.0) in some
//! payloads and percent form in others. Everything past the parse boundary
//! stores percent. Counts are integers; merging sums counts and recomputes
//! rates rather than averaging them.

use serde::{Deserialize, Serialize};

/// Statistics for one flow, campaign, or flow message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatistics {
    pub recipients: u64,
    pub opens: u64,
    /// Percent, 0-100
    pub open_rate: f64,
    pub clicks: u64,
    /// Percent, 0-100
    pub click_rate: f64,
    pub conversions: u64,
    /// Percent, 0-100
    pub conversion_rate: f64,
    /// Revenue attributed to this entity, account currency
    pub conversion_value: f64,
    /// Percent, 0-100
    pub bounce_rate: f64,
    /// Percent, 0-100
    pub unsubscribe_rate: f64,
    /// Percent, 0-100
    pub spam_complaint_rate: f64,
}

/// Normalize a rate to percent: decimal inputs (<= 1) are scaled by 100,
/// anything already above 1 passes through unchanged.
pub fn canonical_rate(value: f64) -> f64 {
    if value <= 1.0 {
        value * 100.0
    } else {
        value
    }
}

impl EntityStatistics {
    /// Revenue per recipient; 0 when there are no recipients
    pub fn revenue_per_recipient(&self) -> f64 {
        if self.recipients > 0 {
            self.conversion_value / self.recipients as f64
        } else {
            0.0
        }
    }

    /// Fold another row (e.g. a per-message row of the same flow) into this
    /// one. Counts and revenue are summed; open/click/conversion rates are
    /// recomputed from the merged counts, and the deliverability rates are
    /// recipient-weighted.
    pub fn absorb(&mut self, other: &EntityStatistics) {
        let self_recipients = self.recipients as f64;
        let other_recipients = other.recipients as f64;
        let merged_recipients = self_recipients + other_recipients;

        if merged_recipients > 0.0 {
            self.bounce_rate = (self.bounce_rate * self_recipients
                + other.bounce_rate * other_recipients)
                / merged_recipients;
            self.unsubscribe_rate = (self.unsubscribe_rate * self_recipients
                + other.unsubscribe_rate * other_recipients)
                / merged_recipients;
            self.spam_complaint_rate = (self.spam_complaint_rate * self_recipients
                + other.spam_complaint_rate * other_recipients)
                / merged_recipients;
        }

        self.recipients += other.recipients;
        self.opens += other.opens;
        self.clicks += other.clicks;
        self.conversions += other.conversions;
        self.conversion_value += other.conversion_value;
        self.recompute_engagement_rates();
    }

    /// Recompute open/click/conversion rates from counts. Rates are 0 when
    /// there are no recipients.
    pub fn recompute_engagement_rates(&mut self) {
        if self.recipients > 0 {
            let recipients = self.recipients as f64;
            self.open_rate = self.opens as f64 / recipients * 100.0;
            self.click_rate = self.clicks as f64 / recipients * 100.0;
            self.conversion_rate = self.conversions as f64 / recipients * 100.0;
        } else {
            self.open_rate = 0.0;
            self.click_rate = 0.0;
            self.conversion_rate = 0.0;
        }
    }

    /// True when the entity saw engagement despite zero recipients, which
    /// indicates a provider data-quality problem rather than real behavior.
    pub fn is_anomalous(&self) -> bool {
        self.recipients == 0 && (self.opens > 0 || self.clicks > 0 || self.conversions > 0)
    }
}
