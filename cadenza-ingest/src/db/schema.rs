//! Database schema for cadenza-ingest
//!
//! Idempotent table creation for the entity graph and scan jobs. Partial
//! unique indexes on `mbid` and `fid` enforce, at the store level, that
//! at most one entity of each type exists per non-null identifier; the
//! resolver relies on these to reject a losing concurrent insert.

use cadenza_common::Result;
use sqlx::SqlitePool;

/// Create all tables and indexes if they don't exist
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            guid TEXT PRIMARY KEY,
            mbid TEXT,
            fid TEXT,
            name TEXT NOT NULL,
            attributed_to TEXT,
            description TEXT,
            cover_url TEXT,
            cover_mimetype TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS albums (
            guid TEXT PRIMARY KEY,
            mbid TEXT,
            fid TEXT,
            title TEXT NOT NULL,
            artist_id TEXT NOT NULL REFERENCES artists(guid),
            release_date TEXT,
            attributed_to TEXT,
            description TEXT,
            cover_url TEXT,
            cover_mimetype TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            guid TEXT PRIMARY KEY,
            mbid TEXT,
            fid TEXT,
            title TEXT NOT NULL,
            artist_id TEXT NOT NULL REFERENCES artists(guid),
            album_id TEXT REFERENCES albums(guid),
            position INTEGER,
            disc_number INTEGER,
            license TEXT,
            copyright TEXT,
            attributed_to TEXT,
            description TEXT,
            cover_url TEXT,
            cover_mimetype TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_jobs (
            job_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            catalog_url TEXT NOT NULL,
            actor TEXT NOT NULL,
            total_items INTEGER NOT NULL DEFAULT 0,
            processed_items INTEGER NOT NULL DEFAULT 0,
            errored_items INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            cancel_requested INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            modified_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one entity per non-null mbid / fid, per table
    for statement in [
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_artists_mbid ON artists(mbid) WHERE mbid IS NOT NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_artists_fid ON artists(fid) WHERE fid IS NOT NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_albums_mbid ON albums(mbid) WHERE mbid IS NOT NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_albums_fid ON albums(fid) WHERE fid IS NOT NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_tracks_mbid ON tracks(mbid) WHERE mbid IS NOT NULL",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_tracks_fid ON tracks(fid) WHERE fid IS NOT NULL",
        "CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id)",
        "CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks(artist_id)",
        "CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
