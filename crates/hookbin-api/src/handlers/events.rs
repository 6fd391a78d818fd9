//! Event listing, lookup and preview.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use hookbin_core::{
    models::{truncate_chars, DETAIL_PREVIEW_CHARS},
    Event, EventFilter, EventId, EventPage, HookbinError,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{first_param, QueryPairs};
use crate::{ApiError, AppState};

/// Raw list parameters. Numbers stay strings so bad input can be defaulted
/// instead of rejected.
#[derive(Debug, Default)]
pub struct ListParams {
    /// Exact source match
    pub source: Option<String>,
    /// Case-insensitive substring of body or headers
    pub q: Option<String>,
    /// Page size, clamped to `[1, 200]`
    pub limit: Option<String>,
    /// Records to skip
    pub offset: Option<String>,
}

impl ListParams {
    /// Reads the parameters from raw pairs; a repeated key keeps its first
    /// value.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let param = |key: &str| first_param(pairs, key).map(str::to_string);
        Self { source: param("source"), q: param("q"), limit: param("limit"), offset: param("offset") }
    }

    fn into_filter(self) -> EventFilter {
        EventFilter::from_params(
            self.source.as_deref(),
            self.q.as_deref(),
            self.limit.as_deref(),
            self.offset.as_deref(),
        )
    }
}

/// Content-aware rendering of an event body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rendering {
    /// Body parsed as JSON.
    Parsed(Value),
    /// Body as text, truncated for display.
    Text(String),
}

impl Rendering {
    /// Parses JSON bodies and falls back to truncated text for everything
    /// else, including JSON that fails to parse.
    pub fn of(event: &Event) -> Self {
        if is_json(&event.content_type) {
            if let Ok(parsed) = serde_json::from_str(&event.body) {
                return Self::Parsed(parsed);
            }
            debug!(event_id = %event.id, "JSON body failed to parse, rendering as text");
        }
        Self::Text(truncate_chars(&event.body, DETAIL_PREVIEW_CHARS).to_string())
    }
}

fn is_json(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/json")
}

/// Detail preview of one event.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    /// Event identifier
    pub id: EventId,
    /// Captured content type
    pub content_type: String,
    /// Either `parsed` or `text`
    #[serde(flatten)]
    pub rendering: Rendering,
}

/// Lists events newest first.
#[instrument(name = "list_events", skip_all)]
pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Result<Json<EventPage>, ApiError> {
    let Query(pairs) =
        query.map_err(|rejection| HookbinError::Validation(rejection.body_text()))?;
    let filter = ListParams::from_pairs(&pairs).into_filter();

    debug!(
        source = %filter.source,
        query = %filter.query,
        limit = filter.limit,
        offset = filter.offset,
        "Listing events"
    );

    let page = state.store.list(filter).await?;
    Ok(Json(page))
}

/// Returns the full record.
#[instrument(name = "get_event", skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    let event = load(&state, &id).await?;
    Ok(Json(event))
}

/// Returns a content-type-aware rendering of the body.
#[instrument(name = "preview_event", skip(state))]
pub async fn preview_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let event = load(&state, &id).await?;
    let rendering = Rendering::of(&event);

    Ok(Json(PreviewResponse { id: event.id, content_type: event.content_type, rendering }))
}

/// Fetches an event; ids that are not UUIDs cannot exist and are reported
/// as not found.
async fn load(state: &AppState, raw_id: &str) -> Result<Event, ApiError> {
    let id: EventId = raw_id.parse().map_err(|_| ApiError::not_found(raw_id))?;
    Ok(state.store.get(id).await?)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use hookbin_core::Headers;
    use serde_json::json;

    use super::*;

    fn event(content_type: &str, body: &str) -> Event {
        Event::new("", Some(content_type), Headers::new(), body.as_bytes(), Utc::now())
    }

    #[test]
    fn json_bodies_are_parsed() {
        let rendering = Rendering::of(&event("application/json", r#"{"a":1}"#));
        assert_eq!(rendering, Rendering::Parsed(json!({ "a": 1 })));
    }

    #[test]
    fn json_detection_ignores_case_and_parameters() {
        let rendering = Rendering::of(&event("Application/JSON; charset=utf-8", "[1,2]"));
        assert_eq!(rendering, Rendering::Parsed(json!([1, 2])));
    }

    #[test]
    fn invalid_json_falls_back_to_text() {
        let rendering = Rendering::of(&event("application/json", "{not json"));
        assert_eq!(rendering, Rendering::Text("{not json".to_string()));
    }

    #[test]
    fn text_is_truncated_to_detail_length() {
        let body = "x".repeat(DETAIL_PREVIEW_CHARS + 500);
        let Rendering::Text(text) = Rendering::of(&event("text/plain", &body)) else {
            panic!("expected text rendering");
        };
        assert_eq!(text.len(), DETAIL_PREVIEW_CHARS);
    }

    #[test]
    fn preview_response_flattens_rendering() {
        let stored = event("text/plain", "hello");
        let response = PreviewResponse {
            id: stored.id,
            content_type: stored.content_type.clone(),
            rendering: Rendering::of(&stored),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({ "id": stored.id.to_string(), "content_type": "text/plain", "text": "hello" })
        );
    }

    #[test]
    fn list_params_default_when_absent() {
        let filter = ListParams::default().into_filter();
        assert_eq!(filter, EventFilter::default());

        let filter = ListParams { limit: Some("500".into()), offset: Some("-3".into()), ..ListParams::default() }
            .into_filter();
        assert_eq!((filter.limit, filter.offset), (200, 0));
    }

    #[test]
    fn repeated_list_params_keep_first_value() {
        let pairs: QueryPairs = [("limit", "5"), ("limit", "7"), ("source", "x"), ("source", "y")]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        let filter = ListParams::from_pairs(&pairs).into_filter();
        assert_eq!(filter.limit, 5);
        assert_eq!(filter.source, "x");
    }
}
