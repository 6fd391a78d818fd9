//! Event persistence behind a backend-agnostic trait.
//!
//! The HTTP layer only ever talks to `dyn EventStore`. Three backends are
//! provided: SQLite through sqlx, a JSON document on disk, and a purely
//! in-memory log used by tests.

use std::{future::Future, pin::Pin};

use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    models::{Event, EventId},
    query::{EventFilter, EventPage, SourceStats},
};

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::FileEventStore;
pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;

/// Boxed future returned by store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Storage operations required by the HTTP layer.
///
/// Implementations must make `insert` and `delete_before` atomic with
/// respect to each other and to readers: a reader sees a record either fully
/// present or fully absent.
pub trait EventStore: Send + Sync + 'static {
    /// Persists a fully-populated event.
    ///
    /// Fails with `CoreError::DuplicateKey` if the id is already stored;
    /// an existing record is never overwritten.
    fn insert(&self, event: Event) -> BoxFuture<'_, Result<EventId>>;

    /// Returns one page of matching records, newest first.
    fn list(&self, filter: EventFilter) -> BoxFuture<'_, Result<EventPage>>;

    /// Returns the full record, or `CoreError::NotFound`.
    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Event>>;

    /// Counts records in total and per source.
    fn count_by_source(&self) -> BoxFuture<'_, Result<SourceStats>>;

    /// Deletes every record received strictly before `cutoff`.
    fn delete_before(&self, cutoff: DateTime<Utc>) -> BoxFuture<'_, Result<u64>>;

    /// Cheap liveness probe of the backend.
    fn health_check(&self) -> BoxFuture<'_, Result<()>>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
