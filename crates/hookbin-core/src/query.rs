//! Query, aggregation and retention types shared by every store backend.
//!
//! Raw request parameters are never rejected: unparseable or out-of-range
//! values are defaulted or clamped, and the effective values are echoed back
//! so callers can detect clamping.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{timestamp, truncate_to_millis, Event, EventPreview};

/// Page size used when none (or zero) is requested.
pub const DEFAULT_LIMIT: u32 = 50;

/// Largest page a single list call returns.
pub const MAX_LIMIT: u32 = 200;

/// Purge age used when the request does not name one.
pub const DEFAULT_PURGE_DAYS: i64 = 7;

/// Upper bound on the purge age, roughly a century.
pub const MAX_PURGE_DAYS: i64 = 36_500;

/// Filter and pagination for listing events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    /// Exact source match; empty matches every source.
    pub source: String,
    /// Substring searched in body and serialized headers; empty matches all.
    pub query: String,
    /// Effective page size, within `[1, MAX_LIMIT]`.
    pub limit: u32,
    /// Effective number of matching records to skip.
    pub offset: u64,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self { source: String::new(), query: String::new(), limit: DEFAULT_LIMIT, offset: 0 }
    }
}

impl EventFilter {
    /// Builds a filter from raw query-string values.
    pub fn from_params(
        source: Option<&str>,
        query: Option<&str>,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> Self {
        Self {
            source: source.unwrap_or_default().to_string(),
            query: query.unwrap_or_default().to_string(),
            limit: clamp_limit(limit),
            offset: clamp_offset(offset),
        }
    }

    /// Restricts the filter to one source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Restricts the filter to records containing `query`.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Sets the page window, clamping it the same way raw parameters are.
    pub fn with_page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = clamp_limit_value(limit);
        self.offset = u64::try_from(offset).unwrap_or(0);
        self
    }

    /// Tests a record against the source and text filters.
    ///
    /// Text matching is ASCII case-insensitive over the body and the
    /// serialized header map.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.source.is_empty() && event.source != self.source {
            return false;
        }
        if self.query.is_empty() {
            return true;
        }
        let needle = self.query.to_ascii_lowercase();
        contains_lowercased(&event.body, &needle)
            || contains_lowercased(&event.headers.to_json(), &needle)
    }
}

fn contains_lowercased(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(lowered_needle)
}

/// Parses a raw `limit` value: missing, unparseable or zero yields the
/// default, anything else is clamped into `[1, MAX_LIMIT]`.
pub fn clamp_limit(raw: Option<&str>) -> u32 {
    match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
        Some(0) | None => DEFAULT_LIMIT,
        Some(value) => clamp_limit_value(value),
    }
}

fn clamp_limit_value(value: i64) -> u32 {
    if value == 0 {
        return DEFAULT_LIMIT;
    }
    u32::try_from(value.clamp(1, i64::from(MAX_LIMIT))).unwrap_or(DEFAULT_LIMIT)
}

/// Parses a raw `offset` value: missing, unparseable or negative yields 0.
pub fn clamp_offset(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|value| u64::try_from(value).ok())
        .unwrap_or(0)
}

/// One page of list results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    /// Matching records, newest first.
    pub items: Vec<EventPreview>,
    /// Effective page size.
    pub limit: u32,
    /// Effective offset.
    pub offset: u64,
    /// Number of records matching the filter, ignoring pagination.
    pub total: u64,
}

/// Record count for one source tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    /// Source tag (may be empty).
    pub source: String,
    /// Number of records with this tag.
    pub c: u64,
}

/// Aggregate record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Total number of stored records.
    pub total: u64,
    /// Per-source counts, largest first, ties by source name.
    pub by_source: Vec<SourceCount>,
}

impl SourceStats {
    /// Builds stats from unordered per-source counts.
    pub fn from_counts(counts: impl IntoIterator<Item = (String, u64)>) -> Self {
        let mut by_source: Vec<SourceCount> =
            counts.into_iter().map(|(source, c)| SourceCount { source, c }).collect();
        by_source.sort_by(|a, b| b.c.cmp(&a.c).then_with(|| a.source.cmp(&b.source)));
        let total = by_source.iter().map(|entry| entry.c).sum();
        Self { total, by_source }
    }

    /// Count for a single source, zero when absent.
    pub fn count_for(&self, source: &str) -> u64 {
        self.by_source.iter().find(|entry| entry.source == source).map_or(0, |entry| entry.c)
    }
}

/// Age threshold for a purge, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeWindow {
    days: i64,
}

impl Default for PurgeWindow {
    fn default() -> Self {
        Self { days: DEFAULT_PURGE_DAYS }
    }
}

impl PurgeWindow {
    /// Creates a window, flooring at one day and capping at `MAX_PURGE_DAYS`.
    pub fn new(days: i64) -> Self {
        Self { days: days.clamp(1, MAX_PURGE_DAYS) }
    }

    /// Reads `days` from a JSON request value.
    ///
    /// Accepts an integer, a float or a numeric string. Anything else,
    /// including a missing field, falls back to the default of 7.
    ///
    /// The window is always a whole number of days: a fractional value is
    /// truncated toward zero before the floor of one day applies, so `1.5`
    /// purges with a one-day window and `0.5` with the minimum of one.
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        let days = value.and_then(|value| match value {
            serde_json::Value::Number(number) => {
                number.as_i64().or_else(|| number.as_f64().map(|float| float.trunc() as i64))
            },
            serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        });
        days.map_or_else(Self::default, Self::new)
    }

    /// Number of days in the window.
    pub fn days(&self) -> i64 {
        self.days
    }

    /// Records strictly older than the returned instant are purged.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let cutoff = TimeDelta::try_days(self.days)
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        truncate_to_millis(cutoff)
    }
}

/// Outcome of a purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Number of records removed.
    pub deleted_events: u64,
    /// Records received before this instant were removed.
    #[serde(with = "timestamp")]
    pub cutoff: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::models::Headers;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some("0")), 50);
        assert_eq!(clamp_limit(Some("abc")), 50);
        assert_eq!(clamp_limit(Some("500")), 200);
        assert_eq!(clamp_limit(Some("-5")), 1);
        assert_eq!(clamp_limit(Some(" 25 ")), 25);
    }

    #[test]
    fn offset_defaults_and_floors() {
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some("x")), 0);
        assert_eq!(clamp_offset(Some("-3")), 0);
        assert_eq!(clamp_offset(Some("40")), 40);
    }

    #[test]
    fn filter_matches_source_exactly() {
        let event = Event::new("stripe", None, Headers::new(), b"{}", Utc::now());

        assert!(EventFilter::default().matches(&event));
        assert!(EventFilter::default().with_source("stripe").matches(&event));
        assert!(!EventFilter::default().with_source("Stripe").matches(&event));
    }

    #[test]
    fn filter_query_is_case_insensitive_over_body_and_headers() {
        let headers: Headers = [("X-GitHub-Event", "push")].into_iter().collect();
        let event = Event::new("", None, headers, br#"{"Amount": 42}"#, Utc::now());

        assert!(EventFilter::default().with_query("amount").matches(&event));
        assert!(EventFilter::default().with_query("GITHUB-EVENT").matches(&event));
        assert!(!EventFilter::default().with_query("refund").matches(&event));
    }

    #[test]
    fn stats_order_by_count_then_source() {
        let stats = SourceStats::from_counts(vec![
            ("b".to_string(), 2),
            ("a".to_string(), 2),
            ("c".to_string(), 5),
        ]);

        let order: Vec<&str> = stats.by_source.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(stats.total, 9);
        assert_eq!(stats.count_for("a"), 2);
        assert_eq!(stats.count_for("zzz"), 0);
    }

    #[test]
    fn purge_days_parsing() {
        assert_eq!(PurgeWindow::from_json(None).days(), 7);
        assert_eq!(PurgeWindow::from_json(Some(&json!(3))).days(), 3);
        assert_eq!(PurgeWindow::from_json(Some(&json!("14"))).days(), 14);
        assert_eq!(PurgeWindow::from_json(Some(&json!(2.9))).days(), 2);
        assert_eq!(PurgeWindow::from_json(Some(&json!(0.5))).days(), 1);
        assert_eq!(PurgeWindow::from_json(Some(&json!(0))).days(), 1);
        assert_eq!(PurgeWindow::from_json(Some(&json!(-10))).days(), 1);
        assert_eq!(PurgeWindow::from_json(Some(&json!("soon"))).days(), 7);
        assert_eq!(PurgeWindow::from_json(Some(&json!(null))).days(), 7);
        assert_eq!(PurgeWindow::from_json(Some(&json!(i64::MAX))).days(), MAX_PURGE_DAYS);
    }

    #[test]
    fn purge_cutoff_is_days_before_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        let cutoff = PurgeWindow::new(7).cutoff(now);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 3, 8, 10, 30, 0).unwrap());

        let fractional = PurgeWindow::from_json(Some(&json!(1.5))).cutoff(now);
        assert_eq!(fractional, Utc.with_ymd_and_hms(2024, 3, 14, 10, 30, 0).unwrap());
    }
}
