//! Timezone-aware, provider-compatible date window calculation
//!
//! The provider expects ISO-8601 instants with a single trailing `Z`, no
//! sub-second precision. Window math happens in UTC; the account timezone is
//! carried along for the aggregation endpoint, and day-based windows are
//! widened to absorb timezone skew between UTC and the account's locale.

use chrono::{DateTime, Duration, Months, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{AuditError, Result};

const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A resolved analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA timezone name forwarded to the aggregation endpoint
    pub timezone: String,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, timezone: impl Into<String>) -> Self {
        Self {
            start,
            end,
            timezone: timezone.into(),
        }
    }

    /// Canonical start instant string (`YYYY-MM-DDTHH:MM:SSZ`)
    pub fn start_str(&self) -> String {
        self.start.format(CANONICAL_FORMAT).to_string()
    }

    /// Canonical end instant string
    pub fn end_str(&self) -> String {
        self.end.format(CANONICAL_FORMAT).to_string()
    }

    /// Whole days covered by the window
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Window for the last `days` days, widened by two days (start side) with
/// day-boundary alignment so data near timezone boundaries is not dropped.
pub fn window_days(days: u32, timezone: &str) -> DateWindow {
    let now = Utc::now();
    let extended = days as i64 + 2;
    let start = (now - Duration::days(extended))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid");
    let end = now
        .date_naive()
        .and_hms_opt(23, 59, 59)
        .expect("23:59:59 is always valid");

    DateWindow::new(
        Utc.from_utc_datetime(&start),
        Utc.from_utc_datetime(&end),
        timezone,
    )
}

/// Window for the last `months` calendar months
pub fn window_months(months: u32, timezone: &str) -> DateWindow {
    let end = Utc::now();
    let start = end
        .checked_sub_months(Months::new(months))
        .unwrap_or_else(|| end - Duration::days(months as i64 * 30));
    DateWindow::new(start, end, timezone)
}

/// The `days`-long window ending just before `window.start`: for a current
/// window starting at S, the previous period is `[S - days, S - 1 day]`.
pub fn previous_period(window: &DateWindow, days: u32) -> DateWindow {
    let previous_end = window.start - Duration::days(1);
    let previous_start = previous_end - Duration::days(days as i64 - 1);
    DateWindow::new(previous_start, previous_end, window.timezone.clone())
}

/// Normalize any ISO datetime string to the canonical `…Z` profile.
///
/// Strips microseconds, repairs double-suffixed strings, replaces `+00:00`
/// with `Z`, and appends `Z` to naive strings. Idempotent.
pub fn ensure_canonical(datetime: &str) -> String {
    let mut s = datetime.trim().to_string();
    if let Some((head, _fraction)) = s.split_once('.') {
        // Preserve any timezone suffix that followed the fraction
        let suffix = if datetime.ends_with('Z') {
            "Z"
        } else if datetime.ends_with("+00:00") {
            "+00:00"
        } else {
            ""
        };
        s = format!("{head}{suffix}");
    }
    while s.contains("+00:00+00:00") {
        s = s.replace("+00:00+00:00", "+00:00");
    }
    if s.ends_with("+00:00") {
        s = s.replace("+00:00", "Z");
    }
    if !s.ends_with('Z') {
        s.push('Z');
    }
    s
}

/// Parse an ISO datetime tolerantly: `Z`, `+00:00`, naive (assumed UTC), and
/// double-suffixed strings are all accepted.
pub fn parse_iso(datetime: &str) -> Result<DateTime<Utc>> {
    let canonical = ensure_canonical(datetime);
    let trimmed = canonical.trim_end_matches('Z');
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| {
            // Date-only inputs occur in interval labels
            chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
        })
        .map_err(|e| AuditError::validation(format!("unparseable datetime '{datetime}': {e}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Validate an explicit window before any I/O: start must precede end, and
/// an end more than a day in the future is clamped to now.
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>, timezone: &str) -> Result<DateWindow> {
    let now = Utc::now();
    let end = if end > now + Duration::days(1) {
        tracing::warn!(
            requested_end = %end,
            clamped_end = %now,
            "window end is in the future, clamping to now"
        );
        now
    } else {
        end
    };

    if start >= end {
        return Err(AuditError::validation(format!(
            "window start {start} must precede end {end}"
        )));
    }

    Ok(DateWindow::new(start, end, timezone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ensure_canonical_variants() {
        assert_eq!(
            ensure_canonical("2025-11-17T00:00:00Z"),
            "2025-11-17T00:00:00Z"
        );
        assert_eq!(
            ensure_canonical("2025-11-17T00:00:00+00:00"),
            "2025-11-17T00:00:00Z"
        );
        assert_eq!(
            ensure_canonical("2025-11-17T00:00:00"),
            "2025-11-17T00:00:00Z"
        );
        assert_eq!(
            ensure_canonical("2025-11-17T00:00:00.123456Z"),
            "2025-11-17T00:00:00Z"
        );
        assert_eq!(
            ensure_canonical("2025-11-17T00:00:00+00:00+00:00"),
            "2025-11-17T00:00:00Z"
        );
    }

    #[test]
    fn test_ensure_canonical_idempotent() {
        let once = ensure_canonical("2025-11-17T08:30:00.5+00:00");
        let twice = ensure_canonical(&once);
        assert_eq!(once, twice);
        assert!(once.ends_with('Z'));
        assert!(!once.ends_with("ZZ"));
    }

    #[test]
    fn test_parse_iso_tolerance() {
        let a = parse_iso("2025-11-17T08:30:00Z").unwrap();
        let b = parse_iso("2025-11-17T08:30:00+00:00").unwrap();
        let c = parse_iso("2025-11-17T08:30:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);

        assert!(parse_iso("not a date").is_err());
    }

    #[test]
    fn test_window_days_extends_for_timezone_skew() {
        let window = window_days(90, "Australia/Sydney");
        assert!(window.days() >= 90);
        assert!(window.days() <= 93);
        assert!(window.start_str().ends_with("T00:00:00Z"));
        assert!(window.end_str().ends_with("T23:59:59Z"));
    }

    #[test]
    fn test_previous_period_math() {
        let start = parse_iso("2025-09-28T00:00:00Z").unwrap();
        let end = parse_iso("2025-12-27T23:59:59Z").unwrap();
        let window = DateWindow::new(start, end, "UTC");

        let previous = previous_period(&window, 90);
        assert_eq!(previous.end, start - Duration::days(1));
        assert_eq!(previous.start, previous.end - Duration::days(89));
    }

    #[test]
    fn test_validate_window_rejects_inverted() {
        let start = parse_iso("2025-02-01T00:00:00Z").unwrap();
        let end = parse_iso("2025-01-01T00:00:00Z").unwrap();
        assert!(validate_window(start, end, "UTC").is_err());
    }

    #[test]
    fn test_validate_window_clamps_future_end() {
        let start = Utc::now() - Duration::days(30);
        let end = Utc::now() + Duration::days(30);
        let window = validate_window(start, end, "UTC").unwrap();
        assert!(window.end <= Utc::now() + Duration::seconds(1));
    }
}
