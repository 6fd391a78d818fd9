//! HTTP request handlers for the hookbin API.
//!
//! Handlers are grouped by functionality:
//! - `health` - liveness, ping and readiness probes
//! - `ingest` - raw webhook capture
//! - `events` - listing, lookup and preview of captured events
//! - `stats` - per-source aggregates
//! - `admin` - age-based purge
//!
//! Failures are returned as [`ApiError`](crate::ApiError), which renders the
//! structured `{"error": {"code", "message"}}` body.

pub mod admin;
pub mod events;
pub mod health;
pub mod ingest;
pub mod stats;

pub use admin::purge_events;
pub use events::{get_event, list_events, preview_event};
pub use health::{health, ping, readiness_check};
pub use ingest::{ingest_event, MAX_PAYLOAD_SIZE};
pub use stats::stats;

/// Query string as ordered `(key, value)` pairs.
///
/// Decoding into pairs never fails on repeated keys, so optional
/// parameters are looked up with [`first_param`] instead of a typed struct.
pub type QueryPairs = Vec<(String, String)>;

/// Value of the first occurrence of `key`.
pub fn first_param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_wins() {
        let pairs: QueryPairs = vec![
            ("limit".into(), "5".into()),
            ("q".into(), "".into()),
            ("limit".into(), "7".into()),
        ];

        assert_eq!(first_param(&pairs, "limit"), Some("5"));
        assert_eq!(first_param(&pairs, "q"), Some(""));
        assert_eq!(first_param(&pairs, "offset"), None);
    }
}
