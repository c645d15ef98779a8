//! Album persistence and candidate lookup

use cadenza_common::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{parse_timestamp, tags_from_json, tags_to_json};
use crate::models::CoverData;

/// Persisted album entity
#[derive(Debug, Clone)]
pub struct Album {
    pub guid: Uuid,
    pub mbid: Option<String>,
    pub fid: Option<String>,
    pub title: String,
    pub artist_id: Uuid,
    pub release_date: Option<NaiveDate>,
    pub attributed_to: Option<String>,
    pub description: Option<String>,
    pub cover: Option<CoverData>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Album {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        let guid_str: String = row.get("guid");
        let artist_id_str: String = row.get("artist_id");
        let created_at: String = row.get("created_at");
        let release_date: Option<String> = row.get("release_date");
        let cover_url: Option<String> = row.get("cover_url");
        let cover_mimetype: Option<String> = row.get("cover_mimetype");
        let tags: String = row.get("tags");

        Ok(Self {
            guid: Uuid::parse_str(&guid_str)
                .map_err(|e| cadenza_common::Error::Internal(format!("Bad album guid: {}", e)))?,
            mbid: row.get("mbid"),
            fid: row.get("fid"),
            title: row.get("title"),
            artist_id: Uuid::parse_str(&artist_id_str).map_err(|e| {
                cadenza_common::Error::Internal(format!("Bad album artist_id: {}", e))
            })?,
            release_date: release_date.and_then(|d| d.parse().ok()),
            attributed_to: row.get("attributed_to"),
            description: row.get("description"),
            cover: cover_url.zip(cover_mimetype).map(|(url, mimetype)| CoverData { url, mimetype }),
            tags: tags_from_json(&tags),
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

/// Insert a new album
pub async fn insert_album(conn: &mut SqliteConnection, album: &Album) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO albums (
            guid, mbid, fid, title, artist_id, release_date, attributed_to,
            description, cover_url, cover_mimetype, tags, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(album.guid.to_string())
    .bind(&album.mbid)
    .bind(&album.fid)
    .bind(&album.title)
    .bind(album.artist_id.to_string())
    .bind(album.release_date.map(|d| d.to_string()))
    .bind(&album.attributed_to)
    .bind(&album.description)
    .bind(album.cover.as_ref().map(|c| c.url.clone()))
    .bind(album.cover.as_ref().map(|c| c.mimetype.clone()))
    .bind(tags_to_json(&album.tags))
    .bind(album.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

/// Load album by local guid
pub async fn load_album(conn: &mut SqliteConnection, guid: Uuid) -> Result<Option<Album>> {
    let row = sqlx::query("SELECT * FROM albums WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(Album::from_row).transpose()
}

/// Find album candidates.
///
/// When an mbid is supplied the strong-identifier predicates apply
/// (`mbid` OR `fid`); otherwise the fallback is the case-insensitive
/// title scoped to the owning artist, OR `fid`. Null predicates are
/// omitted.
pub async fn find_album_candidates(
    conn: &mut SqliteConnection,
    mbid: Option<&str>,
    fid: Option<&str>,
    title_and_artist: Option<(&str, Uuid)>,
) -> Result<Vec<Album>> {
    let (title, artist_id) = match (&mbid, title_and_artist) {
        // mbid takes over from the weak title predicate, matching the
        // lookup precedence of the resolver
        (Some(_), _) | (None, None) => (None, None),
        (None, Some((title, artist_id))) => (Some(title), Some(artist_id.to_string())),
    };

    if mbid.is_none() && fid.is_none() && title.is_none() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT * FROM albums
        WHERE (?1 IS NOT NULL AND mbid = ?1)
           OR (?2 IS NOT NULL AND fid = ?2)
           OR (?3 IS NOT NULL AND lower(title) = lower(?3) AND artist_id = ?4)
        ORDER BY rowid
        "#,
    )
    .bind(mbid)
    .bind(fid)
    .bind(title)
    .bind(artist_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(Album::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::artists::{insert_artist, Artist};
    use crate::db::init_memory_pool;

    async fn seeded_artist(conn: &mut SqliteConnection) -> Uuid {
        let artist = Artist {
            guid: Uuid::new_v4(),
            mbid: None,
            fid: None,
            name: "Seeded".to_string(),
            attributed_to: None,
            description: None,
            cover: None,
            tags: vec![],
            created_at: Utc::now(),
        };
        insert_artist(conn, &artist).await.expect("seed artist");
        artist.guid
    }

    fn album(title: &str, artist_id: Uuid, mbid: Option<&str>, fid: Option<&str>) -> Album {
        Album {
            guid: Uuid::new_v4(),
            mbid: mbid.map(String::from),
            fid: fid.map(String::from),
            title: title.to_string(),
            artist_id,
            release_date: None,
            attributed_to: None,
            description: None,
            cover: None,
            tags: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let pool = init_memory_pool().await.expect("pool");
        let mut conn = pool.acquire().await.expect("conn");
        let artist_id = seeded_artist(&mut conn).await;

        let a = album("First Album", artist_id, Some("mbid-album"), None);
        insert_album(&mut conn, &a).await.expect("insert");

        let loaded = load_album(&mut conn, a.guid)
            .await
            .expect("load")
            .expect("album present");
        assert_eq!(loaded.title, "First Album");
        assert_eq!(loaded.artist_id, artist_id);
    }

    #[tokio::test]
    async fn test_title_match_is_scoped_to_artist() {
        let pool = init_memory_pool().await.expect("pool");
        let mut conn = pool.acquire().await.expect("conn");
        let artist_a = seeded_artist(&mut conn).await;
        let artist_b = seeded_artist(&mut conn).await;

        insert_album(&mut conn, &album("Greatest Hits", artist_a, None, None))
            .await
            .expect("insert");

        // Same title under a different artist must not match
        let found =
            find_album_candidates(&mut conn, None, None, Some(("greatest hits", artist_b)))
                .await
                .expect("query");
        assert!(found.is_empty());

        let found =
            find_album_candidates(&mut conn, None, None, Some(("GREATEST HITS", artist_a)))
                .await
                .expect("query");
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_mbid_suppresses_title_predicate() {
        let pool = init_memory_pool().await.expect("pool");
        let mut conn = pool.acquire().await.expect("conn");
        let artist_id = seeded_artist(&mut conn).await;

        insert_album(&mut conn, &album("Same Title", artist_id, None, None))
            .await
            .expect("insert");

        // A record carrying an mbid only matches by identifier, never by
        // title, so an unrelated same-titled album is not a candidate
        let found = find_album_candidates(
            &mut conn,
            Some("mbid-other"),
            None,
            Some(("Same Title", artist_id)),
        )
        .await
        .expect("query");
        assert!(found.is_empty());
    }
}
