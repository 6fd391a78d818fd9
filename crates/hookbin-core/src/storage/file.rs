//! Event store persisted as a single JSON document.
//!
//! The whole log lives in memory behind a `RwLock`. Inserts and purges take
//! the write lock, rewrite the document through a temporary file plus
//! rename, and only then publish the new state. A failed write leaves both
//! the file and the in-memory log as they were.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::{fs, sync::RwLock};
use tracing::{debug, info, warn};

use super::{memory::EventLog, BoxFuture, EventStore};
use crate::{
    error::{CoreError, Result},
    models::{Event, EventId},
    query::{EventFilter, EventPage, SourceStats},
};

/// File name of the document inside the data directory.
pub const EVENTS_FILE: &str = "events.json";

/// JSON-document backed event store.
#[derive(Debug)]
pub struct FileEventStore {
    path: PathBuf,
    log: RwLock<EventLog>,
}

impl FileEventStore {
    /// Opens the store in `data_dir`, creating the directory if needed and
    /// loading any existing document.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Storage` if the directory cannot be created or
    /// the existing document cannot be read or decoded.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(EVENTS_FILE);

        let log = match fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => EventLog::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EventLog::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), events = log.len(), "Opened file event store");
        Ok(Self { path, log: RwLock::new(log) })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, log: &EventLog) -> Result<()> {
        let bytes = serde_json::to_vec(log)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, &bytes).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "Persisted event document");
        Ok(())
    }
}

impl EventStore for FileEventStore {
    fn insert(&self, event: Event) -> BoxFuture<'_, Result<EventId>> {
        Box::pin(async move {
            let mut log = self.log.write().await;
            let id = log.insert(event)?;
            if let Err(e) = self.persist(&log).await {
                warn!(event_id = %id, error = %e, "Rolling back insert after failed write");
                log.pop();
                return Err(e);
            }
            Ok(id)
        })
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
            if deleted > 0 {
                self.persist(&retained).await?;
                *log = retained;
            }
            Ok(deleted)
        })
    }

    fn health_check(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
            let metadata = fs::metadata(parent).await?;
            if metadata.is_dir() {
                Ok(())
            } else {
                Err(CoreError::Storage(format!("{} is not a directory", parent.display())))
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
