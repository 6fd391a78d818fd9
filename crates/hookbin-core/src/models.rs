//! Event record model and normalization helpers.
//!
//! An `Event` is one captured inbound request. It is built once at ingestion
//! time, never updated, and only destroyed by a purge.

use std::{
    collections::{btree_map, BTreeMap},
    fmt,
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content type recorded when the request carries no `content-type` header.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Number of body characters shown in list previews.
pub const LIST_PREVIEW_CHARS: usize = 200;

/// Number of body characters shown by the detail preview text fallback.
pub const DETAIL_PREVIEW_CHARS: usize = 2000;

/// Strongly-typed event identifier.
///
/// Wraps a random UUID. The id is assigned at ingestion and follows the
/// record until it is purged.
///
/// # Example
///
/// ```
/// use hookbin_core::models::EventId;
///
/// let id = EventId::new();
/// let parsed: EventId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Value(s) captured for one header name.
///
/// Serializes as a plain string when the header appeared once and as an
/// array of strings, in arrival order, when it appeared several times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    /// Header seen exactly once.
    One(String),
    /// Header seen more than once.
    Many(Vec<String>),
}

impl HeaderValues {
    fn push(&mut self, value: String) {
        match self {
            Self::One(first) => {
                let first = std::mem::take(first);
                *self = Self::Many(vec![first, value]);
            },
            Self::Many(values) => values.push(value),
        }
    }

    /// Returns the first value received for this header.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }

    /// Iterates over every value in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }
}

/// Inbound request headers keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, HeaderValues>);

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, keeping earlier values for the same name.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.entry(name.to_ascii_lowercase()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(HeaderValues::One(value));
            },
            btree_map::Entry::Occupied(mut slot) => slot.get_mut().push(value),
        }
    }

    /// Looks up a header by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&HeaderValues> {
        self.0.get(&name.to_ascii_lowercase())
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no headers were captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(name, values)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValues)> {
        self.0.iter().map(|(name, values)| (name.as_str(), values))
    }

    /// Serialized JSON form, as stored and as searched by text queries.
    pub fn to_json(&self) -> String {
        // A map of strings to strings or string arrays cannot fail to encode.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

/// One captured inbound webhook request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier assigned at ingestion.
    pub id: EventId,

    /// Caller-supplied origin tag, empty when absent.
    pub source: String,

    /// MIME type from the inbound `content-type` header.
    pub content_type: String,

    /// Every inbound request header.
    pub headers: Headers,

    /// Raw payload decoded as UTF-8, lossily for binary bodies.
    pub body: String,

    /// Ingestion time at millisecond precision.
    #[serde(with = "timestamp")]
    pub received_at: DateTime<Utc>,
}

impl Event {
    /// Builds a new event with a fresh id.
    ///
    /// `received_at` is truncated to millisecond precision so the value read
    /// back from any backend equals the value written.
    pub fn new(
        source: impl Into<String>,
        content_type: Option<&str>,
        headers: Headers,
        body: &[u8],
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            source: source.into(),
            content_type: content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string(),
            headers,
            body: decode_body(body),
            received_at: truncate_to_millis(received_at),
        }
    }

    /// Summary used by list views.
    pub fn preview(&self) -> EventPreview {
        EventPreview {
            id: self.id,
            source: self.source.clone(),
            content_type: self.content_type.clone(),
            received_at: self.received_at,
            preview: truncate_chars(&self.body, LIST_PREVIEW_CHARS).to_string(),
        }
    }
}

/// List-view summary of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPreview {
    /// Event identifier.
    pub id: EventId,
    /// Origin tag.
    pub source: String,
    /// Captured content type.
    pub content_type: String,
    /// Ingestion time.
    #[serde(with = "timestamp")]
    pub received_at: DateTime<Utc>,
    /// First 200 characters of the body.
    pub preview: String,
}

/// Decodes a payload as UTF-8, replacing invalid sequences.
pub fn decode_body(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

/// Returns the prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Drops sub-millisecond precision.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Fixed-width ISO-8601 UTC timestamps (`2024-01-31T09:05:00.123Z`).
///
/// Every field is zero padded, so lexical and chronological order agree.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Formats a timestamp in the wire format.
    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Serde serializer for the wire format.
    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    /// Serde deserializer accepting any RFC 3339 timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn headers_keep_repeated_values_in_order() {
        let headers: Headers =
            [("X-Trace", "a"), ("x-trace", "b"), ("Content-Type", "text/plain")].into_iter().collect();

        assert_eq!(headers.len(), 2);
        let trace: Vec<&str> = headers.get("x-trace").unwrap().iter().collect();
        assert_eq!(trace, vec!["a", "b"]);
        assert_eq!(headers.get("CONTENT-TYPE").unwrap().first(), Some("text/plain"));
    }

    #[test]
    fn headers_serialize_single_values_as_strings() {
        let headers: Headers = [("accept", "*/*"), ("via", "1"), ("via", "2")].into_iter().collect();

        assert_eq!(headers.to_json(), r#"{"accept":"*/*","via":["1","2"]}"#);

        let back: Headers = serde_json::from_str(&headers.to_json()).unwrap();
        assert_eq!(back, headers);
    }

    #[test]
    fn missing_content_type_defaults_to_octet_stream() {
        let event = Event::new("", None, Headers::new(), b"", Utc::now());
        assert_eq!(event.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn binary_body_is_decoded_lossily() {
        let event = Event::new("", None, Headers::new(), &[0x68, 0x69, 0xff], Utc::now());
        assert_eq!(event.body, "hi\u{fffd}");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn preview_holds_first_200_characters() {
        let body = "x".repeat(500);
        let event = Event::new("s", Some("text/plain"), Headers::new(), body.as_bytes(), Utc::now());

        let preview = event.preview();
        assert_eq!(preview.preview.chars().count(), LIST_PREVIEW_CHARS);
        assert_eq!(preview.id, event.id);
        assert_eq!(preview.source, "s");
    }

    #[test]
    fn timestamps_are_fixed_width_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(timestamp::format(&ts), "2024-01-02T03:04:05.000Z");
    }

    #[test]
    fn received_at_is_truncated_and_round_trips() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let event = Event::new("", None, Headers::new(), b"{}", ts);

        assert_eq!(event.received_at.timestamp_subsec_nanos(), 123_000_000);

        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn event_id_parses_its_display_form() {
        let id = EventId::new();
        assert_eq!(id.to_string().parse::<EventId>().unwrap(), id);
        assert!("not-a-uuid".parse::<EventId>().is_err());
    }
}
