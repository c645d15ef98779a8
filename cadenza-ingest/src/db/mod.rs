//! Database access for cadenza-ingest
//!
//! SQLite-backed persistence for the entity graph (artists, albums,
//! tracks) and scan jobs. All entity operations take a
//! `&mut SqliteConnection` so one resolution can run inside one
//! transaction.

pub mod albums;
pub mod artists;
pub mod scan_jobs;
pub mod schema;
pub mod tracks;

use cadenza_common::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits for a writer before SQLITE_BUSY
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse an RFC3339 timestamp column
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp '{}': {}", s, e)))
}

/// Serialize a tag list for the TEXT tags column
pub(crate) fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Deserialize the TEXT tags column, tolerating bad data
pub(crate) fn tags_from_json(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Initialize database connection pool
///
/// Connects to (or creates) the database file and brings the schema up.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::debug!("Connecting to database: {}", db_path.display());

    // WAL with a busy timeout so concurrent writers queue instead of
    // failing outright; resolution-level retry covers the upgrade case
    // the timeout cannot
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePool::connect_with(options).await?;
    schema::initialize_schema(&pool).await?;

    Ok(pool)
}

/// In-memory pool for tests.
///
/// Capped at one connection: each sqlite in-memory connection is its
/// own database, so a larger pool would splinter the test state.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    schema::initialize_schema(&pool).await?;
    Ok(pool)
}
