//! Webhook ingestion handler.
//!
//! Captures the raw body, every request header, the content type and the
//! optional `source` tag, then persists them as a new event. No signature
//! or schema validation is applied.

use axum::{
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hookbin_core::{models::timestamp, Event, EventId, Headers, HookbinError};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{first_param, QueryPairs};
use crate::ApiError;

/// Upper bound on an ingested body: 5 MiB.
pub const MAX_PAYLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Query parameters accepted by `POST /api/events`.
#[derive(Debug, Default)]
pub struct IngestParams {
    /// Origin tag such as `stripe` or `github`.
    pub source: Option<String>,
}

impl IngestParams {
    /// Reads the parameters from raw pairs; a repeated key keeps its first
    /// value.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        Self { source: first_param(pairs, "source").map(str::to_string) }
    }
}

/// Response from a successful ingestion.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Identifier of the stored event
    pub id: EventId,
    /// Timestamp assigned to the event
    #[serde(with = "timestamp")]
    pub received_at: DateTime<Utc>,
}

/// Ingests a webhook of any content type.
///
/// # Errors
///
/// - 400: malformed query string
/// - 413: body larger than [`MAX_PAYLOAD_SIZE`]
/// - 500: storage failure
#[instrument(name = "ingest_event", skip_all)]
pub async fn ingest_event(
    State(state): State<crate::AppState>,
    query: Result<Query<QueryPairs>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let Query(pairs) =
        query.map_err(|rejection| HookbinError::Validation(rejection.body_text()))?;
    let params = IngestParams::from_pairs(&pairs);

    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            let size_bytes = declared_length(&headers).unwrap_or(MAX_PAYLOAD_SIZE + 1);
            warn!(size_bytes, limit = MAX_PAYLOAD_SIZE, "Payload exceeds size limit");
            HookbinError::PayloadTooLarge { size_bytes, limit_bytes: MAX_PAYLOAD_SIZE }
        } else {
            HookbinError::Validation(rejection.body_text())
        }
    })?;

    if body.len() > MAX_PAYLOAD_SIZE {
        warn!(size_bytes = body.len(), limit = MAX_PAYLOAD_SIZE, "Payload exceeds size limit");
        return Err(HookbinError::PayloadTooLarge {
            size_bytes: body.len(),
            limit_bytes: MAX_PAYLOAD_SIZE,
        }
        .into());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let event = Event::new(
        params.source.unwrap_or_default(),
        content_type.as_deref(),
        extract_headers(&headers),
        &body,
        state.clock.now(),
    );
    let response = IngestResponse { id: event.id, received_at: event.received_at };

    debug!(
        event_id = %event.id,
        source = %event.source,
        content_type = %event.content_type,
        payload_size = body.len(),
        "Persisting event"
    );

    state.store.insert(event).await?;

    info!(event_id = %response.id, "Webhook ingested");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Collects every header value, repeated names included, in arrival order.
fn extract_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect()
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}
