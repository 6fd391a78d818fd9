//! Maintenance endpoints.

use axum::{extract::State, Json};
use bytes::Bytes;
use hookbin_core::{PurgeReport, PurgeWindow};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::{ApiError, AppState};

/// Deletes events older than `days` (default 7, at least 1).
///
/// The body is optional. A missing, empty or malformed body, or a `days`
/// value that is not a number, uses the default window.
#[instrument(name = "purge_events", skip_all)]
pub async fn purge_events(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PurgeReport>, ApiError> {
    let window = PurgeWindow::from_json(parse_body(&body).get("days"));
    let cutoff = window.cutoff(state.clock.now());

    let deleted_events = state.store.delete_before(cutoff).await?;

    info!(days = window.days(), deleted_events, cutoff = %cutoff, "Purged events");
    Ok(Json(PurgeReport { deleted_events, cutoff }))
}

fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!(error = %e, "Ignoring malformed purge body");
        Value::Null
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_is_read_from_json_body() {
        assert_eq!(PurgeWindow::from_json(parse_body(br#"{"days": 30}"#).get("days")).days(), 30);
        assert_eq!(PurgeWindow::from_json(parse_body(br#"{"days": "3"}"#).get("days")).days(), 3);
    }

    #[test]
    fn missing_or_malformed_body_uses_default() {
        for body in [&b""[..], b"  ", b"{", b"[]", br#"{"days": null}"#] {
            assert_eq!(PurgeWindow::from_json(parse_body(body).get("days")).days(), 7);
        }
    }

    #[test]
    fn days_is_floored_at_one() {
        assert_eq!(PurgeWindow::from_json(parse_body(br#"{"days": 0}"#).get("days")).days(), 1);
        assert_eq!(PurgeWindow::from_json(parse_body(br#"{"days": -4}"#).get("days")).days(), 1);
    }
}
