//! SQLite event store over sqlx.
//!
//! One `events` table. `received_at` is stored as integer epoch milliseconds
//! so ordering and cutoff comparisons are numeric; `seq` (the rowid) breaks
//! ties between equal timestamps. Text search lowercases both sides with
//! SQLite's ASCII-only `lower()`, matching the in-memory backends.

use std::{path::Path, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tracing::{debug, info};

use super::{BoxFuture, EventStore};
use crate::{
    error::{CoreError, Result},
    models::{Event, EventId, EventPreview, Headers, LIST_PREVIEW_CHARS},
    query::{EventFilter, EventPage, SourceStats},
};

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        source TEXT NOT NULL DEFAULT '',
        content_type TEXT NOT NULL,
        headers TEXT NOT NULL,
        body TEXT NOT NULL,
        received_at INTEGER NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_events_received_at ON events(received_at DESC, seq DESC)",
    "CREATE INDEX IF NOT EXISTS idx_events_source ON events(source)",
];

const MATCH_CLAUSE: &str = r"
    (?1 = '' OR source = ?1)
    AND (?2 = '' OR instr(lower(body), ?2) > 0 OR instr(lower(headers), ?2) > 0)
";

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    source: String,
    content_type: String,
    headers: String,
    body: String,
    received_at: i64,
}

impl TryFrom<EventRow> for Event {
    type Error = CoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.id)?,
            source: row.source,
            content_type: row.content_type,
            headers: serde_json::from_str::<Headers>(&row.headers)?,
            body: row.body,
            received_at: from_millis(row.received_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PreviewRow {
    id: String,
    source: String,
    content_type: String,
    preview: String,
    received_at: i64,
}

impl TryFrom<PreviewRow> for EventPreview {
    type Error = CoreError;

    fn try_from(row: PreviewRow) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.id)?,
            source: row.source,
            content_type: row.content_type,
            received_at: from_millis(row.received_at)?,
            preview: row.preview,
        })
    }
}

fn parse_id(raw: &str) -> Result<EventId> {
    raw.parse().map_err(|e| CoreError::Storage(format!("invalid stored event id {raw:?}: {e}")))
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| CoreError::Storage(format!("invalid stored timestamp {millis}")))
}

/// SQLite-backed event store.
#[derive(Debug, Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Connects to `url`, creating the database file (and its directory) if
    /// missing, and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Storage` if the URL is invalid, the database
    /// cannot be opened, or schema creation fails.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && parent != Path::new(":memory:") {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        info!(url = %url, max_connections, "Connected to SQLite event store");
        Self::from_pool(pool).await
    }

    /// Opens a private in-memory database.
    ///
    /// Uses a single connection that is never recycled, since every SQLite
    /// memory connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Storage` if the database cannot be created.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and bootstraps the schema.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Storage` if schema creation fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("SQLite schema ready");
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_impl(&self, event: Event) -> Result<EventId> {
        let result = sqlx::query(
            r"
            INSERT INTO events (id, source, content_type, headers, body, received_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(event.id.to_string())
        .bind(&event.source)
        .bind(&event.content_type)
        .bind(event.headers.to_json())
        .bind(&event.body)
        .bind(event.received_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(event.id),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CoreError::DuplicateKey(event.id))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn list_impl(&self, filter: EventFilter) -> Result<EventPage> {
        let needle = filter.query.to_ascii_lowercase();
        let limit = i64::from(filter.limit);
        let offset = i64::try_from(filter.offset).unwrap_or(i64::MAX);

        // Count and page from one read snapshot.
        let mut tx = self.pool.begin().await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM events WHERE {MATCH_CLAUSE}"))
                .bind(&filter.source)
                .bind(&needle)
                .fetch_one(&mut *tx)
                .await?;

        let rows: Vec<PreviewRow> = sqlx::query_as(&format!(
            r"
            SELECT id, source, content_type, received_at,
                   substr(body, 1, {LIST_PREVIEW_CHARS}) AS preview
            FROM events
            WHERE {MATCH_CLAUSE}
            ORDER BY received_at DESC, seq DESC
            LIMIT ?3 OFFSET ?4
            "
        ))
        .bind(&filter.source)
        .bind(&needle)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let items = rows.into_iter().map(EventPreview::try_from).collect::<Result<Vec<_>>>()?;
        Ok(EventPage {
            items,
            limit: filter.limit,
            offset: filter.offset,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn get_impl(&self, id: EventId) -> Result<Event> {
        let row: Option<EventRow> = sqlx::query_as(
            r"
            SELECT id, source, content_type, headers, body, received_at
            FROM events
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| CoreError::NotFound(id.to_string()))?.try_into()
    }

    async fn count_by_source_impl(&self) -> Result<SourceStats> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT source, COUNT(*) AS c FROM events GROUP BY source")
                .fetch_all(&self.pool)
                .await?;

        Ok(SourceStats::from_counts(
            rows.into_iter().map(|(source, c)| (source, u64::try_from(c).unwrap_or(0))),
        ))
    }

    async fn delete_before_impl(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM events WHERE received_at < ?1")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

impl EventStore for SqliteEventStore {
    fn insert(&self, event: Event) -> BoxFuture<'_, Result<EventId>> {
        Box::pin(self.insert_impl(event))
    }

    fn list(&self, filter: EventFilter) -> BoxFuture<'_, Result<EventPage>> {
        Box::pin(self.list_impl(filter))
    }

    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Event>> {
        Box::pin(self.get_impl(id))
    }

    fn count_by_source(&self) -> BoxFuture<'_, Result<SourceStats>> {
        Box::pin(self.count_by_source_impl())
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> BoxFuture<'_, Result<u64>> {
        Box::pin(self.delete_before_impl(cutoff))
    }

    fn health_check(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
            Ok(())
        })
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
