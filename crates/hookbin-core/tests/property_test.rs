//! Property-based tests for list clamping, ordering and purge invariants.
//!
//! Runs against the in-memory log so every case is deterministic and fast.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use hookbin_core::{
    query::{clamp_limit, clamp_offset, MAX_LIMIT},
    storage::memory::EventLog,
    Event, EventFilter, Headers, PurgeWindow,
};
use proptest::{prelude::*, test_runner::Config as ProptestConfig};

fn proptest_config() -> ProptestConfig {
    ProptestConfig { cases: 64, failure_persistence: None, ..ProptestConfig::default() }
}

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn events_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(
        (prop::sample::select(vec!["", "stripe", "github", "shopify"]), 0i64..(30 * 24 * 60)),
        0..40,
    )
    .prop_map(|items| items.into_iter().map(|(source, minutes)| (source.to_string(), minutes)).collect())
}

fn build_log(specs: &[(String, i64)]) -> EventLog {
    let mut log = EventLog::new();
    for (i, (source, minutes)) in specs.iter().enumerate() {
        let body = format!("event-{i}");
        let at = origin() + TimeDelta::minutes(*minutes);
        log.insert(Event::new(source.as_str(), None, Headers::new(), body.as_bytes(), at)).unwrap();
    }
    log
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn limit_always_lands_in_range(raw in any::<i64>()) {
        let limit = clamp_limit(Some(&raw.to_string()));
        prop_assert!((1..=MAX_LIMIT).contains(&limit));
        if raw == 0 {
            prop_assert_eq!(limit, 50);
        }
    }

    #[test]
    fn garbage_limit_and_offset_use_defaults(raw in "[a-z ]{0,12}") {
        prop_assert_eq!(clamp_limit(Some(&raw)), 50);
        prop_assert_eq!(clamp_offset(Some(&raw)), 0);
    }

    #[test]
    fn list_is_sorted_descending(specs in events_strategy(), limit in 1i64..60, offset in 0i64..50) {
        let log = build_log(&specs);
        let page = log.list(&EventFilter::default().with_page(limit, offset));

        prop_assert!(page.items.len() as i64 <= limit);
        prop_assert_eq!(page.total, specs.len() as u64);
        for pair in page.items.windows(2) {
            prop_assert!(pair[0].received_at >= pair[1].received_at);
        }
    }

    #[test]
    fn source_filter_returns_only_that_source(specs in events_strategy()) {
        let log = build_log(&specs);
        let page = log.list(&EventFilter::default().with_source("stripe").with_page(200, 0));

        let expected = specs.iter().filter(|(source, _)| source == "stripe").count();
        prop_assert_eq!(page.total, expected as u64);
        prop_assert!(page.items.iter().all(|item| item.source == "stripe"));
    }

    #[test]
    fn purge_removes_exactly_older_records(specs in events_strategy(), days in 1i64..30) {
        let log = build_log(&specs);
        let now = origin() + TimeDelta::days(30);
        let cutoff = PurgeWindow::new(days).cutoff(now);

        let (retained, deleted) = log.without_before(cutoff);
        let expected_deleted =
            specs.iter().filter(|(_, minutes)| origin() + TimeDelta::minutes(*minutes) < cutoff).count();

        prop_assert_eq!(deleted, expected_deleted as u64);
        prop_assert_eq!(retained.len() + expected_deleted, specs.len());

        let (_, again) = retained.without_before(cutoff);
        prop_assert_eq!(again, 0);
    }

    #[test]
    fn stats_total_matches_record_count(specs in events_strategy()) {
        let stats = build_log(&specs).count_by_source();

        prop_assert_eq!(stats.total, specs.len() as u64);
        for pair in stats.by_source.windows(2) {
            prop_assert!(pair[0].c >= pair[1].c);
        }
    }
}
