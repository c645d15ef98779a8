//! Artist persistence and candidate lookup

use cadenza_common::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{parse_timestamp, tags_from_json, tags_to_json};
use crate::models::CoverData;

/// Persisted artist entity
#[derive(Debug, Clone)]
pub struct Artist {
    pub guid: Uuid,
    pub mbid: Option<String>,
    pub fid: Option<String>,
    pub name: String,
    pub attributed_to: Option<String>,
    pub description: Option<String>,
    pub cover: Option<CoverData>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Artist {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        let guid_str: String = row.get("guid");
        let created_at: String = row.get("created_at");
        let cover_url: Option<String> = row.get("cover_url");
        let cover_mimetype: Option<String> = row.get("cover_mimetype");
        let tags: String = row.get("tags");

        Ok(Self {
            guid: Uuid::parse_str(&guid_str)
                .map_err(|e| cadenza_common::Error::Internal(format!("Bad artist guid: {}", e)))?,
            mbid: row.get("mbid"),
            fid: row.get("fid"),
            name: row.get("name"),
            attributed_to: row.get("attributed_to"),
            description: row.get("description"),
            cover: cover_url.zip(cover_mimetype).map(|(url, mimetype)| CoverData { url, mimetype }),
            tags: tags_from_json(&tags),
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

/// Insert a new artist.
///
/// A unique-violation error here means another writer won a concurrent
/// insert for the same mbid/fid; callers re-query and reuse that row.
pub async fn insert_artist(conn: &mut SqliteConnection, artist: &Artist) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO artists (
            guid, mbid, fid, name, attributed_to, description,
            cover_url, cover_mimetype, tags, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(artist.guid.to_string())
    .bind(&artist.mbid)
    .bind(&artist.fid)
    .bind(&artist.name)
    .bind(&artist.attributed_to)
    .bind(&artist.description)
    .bind(artist.cover.as_ref().map(|c| c.url.clone()))
    .bind(artist.cover.as_ref().map(|c| c.mimetype.clone()))
    .bind(tags_to_json(&artist.tags))
    .bind(artist.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

/// Load artist by local guid
pub async fn load_artist(conn: &mut SqliteConnection, guid: Uuid) -> Result<Option<Artist>> {
    let row = sqlx::query("SELECT * FROM artists WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(Artist::from_row).transpose()
}

/// Find artist candidates matching any of the supplied predicates.
///
/// Null predicates are omitted from the disjunction, not treated as
/// wildcards. Results come back in encounter (insertion) order.
pub async fn find_artist_candidates(
    conn: &mut SqliteConnection,
    mbid: Option<&str>,
    fid: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<Artist>> {
    if mbid.is_none() && fid.is_none() && name.is_none() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT * FROM artists
        WHERE (?1 IS NOT NULL AND mbid = ?1)
           OR (?2 IS NOT NULL AND fid = ?2)
           OR (?3 IS NOT NULL AND lower(name) = lower(?3))
        ORDER BY rowid
        "#,
    )
    .bind(mbid)
    .bind(fid)
    .bind(name)
    .fetch_all(conn)
    .await?;

    rows.iter().map(Artist::from_row).collect()
}
