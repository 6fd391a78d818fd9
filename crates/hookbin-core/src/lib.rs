//! Core domain model and storage for the hookbin webhook receiver.
//!
//! Provides the immutable `Event` record, list/filter/retention semantics,
//! the error taxonomy, a clock abstraction, and the `EventStore` trait with
//! SQLite, JSON-file and in-memory backends.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod query;
pub mod storage;
pub mod time;

pub use error::{CoreError, HookbinError, Result};
pub use models::{Event, EventId, EventPreview, HeaderValues, Headers};
pub use query::{EventFilter, EventPage, PurgeReport, PurgeWindow, SourceCount, SourceStats};
pub use storage::{EventStore, FileEventStore, MemoryEventStore, SqliteEventStore};
pub use time::{Clock, RealClock, TestClock};
