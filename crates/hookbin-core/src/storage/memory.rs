//! In-memory event log.
//!
//! `EventLog` holds the matching, ordering and aggregation rules for the
//! non-SQL backends. `MemoryEventStore` wraps it in a lock with no
//! persistence; the file backend reuses it and adds a JSON document.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{BoxFuture, EventStore};
use crate::{
    error::{CoreError, Result},
    models::{Event, EventId},
    query::{EventFilter, EventPage, SourceStats},
};

/// Events in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true when the log holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends an event unless its id is already present.
    pub fn insert(&mut self, event: Event) -> Result<EventId> {
        if self.events.iter().any(|existing| existing.id == event.id) {
            return Err(CoreError::DuplicateKey(event.id));
        }
        let id = event.id;
        self.events.push(event);
        Ok(id)
    }

    /// Removes the most recently inserted event.
    pub(crate) fn pop(&mut self) -> Option<Event> {
        self.events.pop()
    }

    /// Filtered page, ordered by `received_at` descending with later
    /// insertions first among equal timestamps.
    pub fn list(&self, filter: &EventFilter) -> EventPage {
        let mut matching: Vec<&Event> =
            self.events.iter().rev().filter(|event| filter.matches(event)).collect();
        // Stable sort keeps the reversed insertion order for ties.
        matching.sort_by(|a, b| b.received_at.cmp(&a.received_at));

        let total = matching.len() as u64;
        let skip = usize::try_from(filter.offset).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(skip)
            .take(filter.limit as usize)
            .map(Event::preview)
            .collect();

        EventPage { items, limit: filter.limit, offset: filter.offset, total }
    }

    /// Looks up an event by id.
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    /// Per-source counts.
    pub fn count_by_source(&self) -> SourceStats {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for event in &self.events {
            *counts.entry(event.source.as_str()).or_default() += 1;
        }
        SourceStats::from_counts(counts.into_iter().map(|(source, c)| (source.to_string(), c)))
    }

    /// Returns the log without events older than `cutoff`, and how many were
    /// dropped. `self` is left untouched.
    pub fn without_before(&self, cutoff: DateTime<Utc>) -> (Self, u64) {
        let retained: Vec<Event> =
            self.events.iter().filter(|event| event.received_at >= cutoff).cloned().collect();
        let deleted = (self.events.len() - retained.len()) as u64;
        (Self { events: retained }, deleted)
    }
}

/// Event store with no persistence.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    log: RwLock<EventLog>,
}

impl MemoryEventStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn insert(&self, event: Event) -> BoxFuture<'_, Result<EventId>> {
        Box::pin(async move { self.log.write().await.insert(event) })
    }

    fn list(&self, filter: EventFilter) -> BoxFuture<'_, Result<EventPage>> {
        Box::pin(async move { Ok(self.log.read().await.list(&filter)) })
    }

    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Event>> {
        Box::pin(async move {
            self.log.read().await.get(id).cloned().ok_or_else(|| CoreError::NotFound(id.to_string()))
        })
    }

    fn count_by_source(&self) -> BoxFuture<'_, Result<SourceStats>> {
        Box::pin(async move { Ok(self.log.read().await.count_by_source()) })
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let mut log = self.log.write().await;
            let (retained, deleted) = log.without_before(cutoff);
            *log = retained;
            Ok(deleted)
        })
    }

    fn health_check(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::models::Headers;

    fn event_at(source: &str, body: &str, secs: i64) -> Event {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        Event::new(source, Some("text/plain"), Headers::new(), body.as_bytes(), ts)
    }

    #[test]
    fn duplicate_ids_are_rejected_without_overwrite() {
        let mut log = EventLog::new();
        let original = event_at("a", "first", 0);
        let mut clash = event_at("b", "second", 1);
        clash.id = original.id;

        log.insert(original.clone()).unwrap();
        let err = log.insert(clash).unwrap_err();

        assert!(matches!(err, CoreError::DuplicateKey(id) if id == original.id));
        assert_eq!(log.get(original.id), Some(&original));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn list_orders_newest_first_with_insertion_tiebreak() {
        let mut log = EventLog::new();
        let old = event_at("", "old", 0);
        let tie_first = event_at("", "tie-1", 10);
        let tie_second = event_at("", "tie-2", 10);
        let newest = event_at("", "new", 20);
        for event in [&tie_first, &old, &newest, &tie_second] {
            log.insert((*event).clone()).unwrap();
        }

        let page = log.list(&EventFilter::default());
        let bodies: Vec<&str> = page.items.iter().map(|item| item.preview.as_str()).collect();
        assert_eq!(bodies, vec!["new", "tie-2", "tie-1", "old"]);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn list_applies_offset_after_filtering() {
        let mut log = EventLog::new();
        for i in 0..5 {
            log.insert(event_at("keep", &format!("k{i}"), i)).unwrap();
            log.insert(event_at("drop", &format!("d{i}"), i)).unwrap();
        }

        let filter = EventFilter::default().with_source("keep").with_page(2, 1);
        let page = log.list(&filter);

        let bodies: Vec<&str> = page.items.iter().map(|item| item.preview.as_str()).collect();
        assert_eq!(bodies, vec!["k3", "k2"]);
        assert_eq!(page.total, 5);
        assert_eq!((page.limit, page.offset), (2, 1));
    }

    #[test]
    fn without_before_is_strict() {
        let mut log = EventLog::new();
        let at_cutoff = event_at("", "edge", 100);
        log.insert(event_at("", "older", 99)).unwrap();
        log.insert(at_cutoff.clone()).unwrap();

        let (retained, deleted) = log.without_before(at_cutoff.received_at);

        assert_eq!(deleted, 1);
        assert_eq!(retained.len(), 1);
        assert!(retained.get(at_cutoff.id).is_some());
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn memory_store_purges_and_counts() {
        let store = MemoryEventStore::new();
        let old = event_at("github", "a", 0);
        let recent = event_at("stripe", "b", 3600);
        store.insert(old.clone()).await.unwrap();
        store.insert(recent.clone()).await.unwrap();

        let deleted = store.delete_before(recent.received_at - TimeDelta::seconds(1)).await.unwrap();
        assert_eq!(deleted, 1);

        let stats = store.count_by_source().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.count_for("stripe"), 1);
        assert!(matches!(store.get(old.id).await, Err(CoreError::NotFound(_))));
    }
}
