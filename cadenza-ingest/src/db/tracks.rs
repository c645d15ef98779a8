//! Track persistence and candidate lookup

use cadenza_common::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{parse_timestamp, tags_from_json, tags_to_json};
use crate::models::CoverData;

/// Persisted track entity
#[derive(Debug, Clone)]
pub struct Track {
    pub guid: Uuid,
    pub mbid: Option<String>,
    pub fid: Option<String>,
    pub title: String,
    pub artist_id: Uuid,
    pub album_id: Option<Uuid>,
    pub position: Option<i64>,
    pub disc_number: Option<i64>,
    pub license: Option<String>,
    pub copyright: Option<String>,
    pub attributed_to: Option<String>,
    pub description: Option<String>,
    pub cover: Option<CoverData>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Track {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        let guid_str: String = row.get("guid");
        let artist_id_str: String = row.get("artist_id");
        let album_id_str: Option<String> = row.get("album_id");
        let created_at: String = row.get("created_at");
        let cover_url: Option<String> = row.get("cover_url");
        let cover_mimetype: Option<String> = row.get("cover_mimetype");
        let tags: String = row.get("tags");

        Ok(Self {
            guid: Uuid::parse_str(&guid_str)
                .map_err(|e| cadenza_common::Error::Internal(format!("Bad track guid: {}", e)))?,
            mbid: row.get("mbid"),
            fid: row.get("fid"),
            title: row.get("title"),
            artist_id: Uuid::parse_str(&artist_id_str).map_err(|e| {
                cadenza_common::Error::Internal(format!("Bad track artist_id: {}", e))
            })?,
            album_id: album_id_str
                .map(|s| {
                    Uuid::parse_str(&s).map_err(|e| {
                        cadenza_common::Error::Internal(format!("Bad track album_id: {}", e))
                    })
                })
                .transpose()?,
            position: row.get("position"),
            disc_number: row.get("disc_number"),
            license: row.get("license"),
            copyright: row.get("copyright"),
            attributed_to: row.get("attributed_to"),
            description: row.get("description"),
            cover: cover_url.zip(cover_mimetype).map(|(url, mimetype)| CoverData { url, mimetype }),
            tags: tags_from_json(&tags),
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

/// Insert a new track
pub async fn insert_track(conn: &mut SqliteConnection, track: &Track) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracks (
            guid, mbid, fid, title, artist_id, album_id, position, disc_number,
            license, copyright, attributed_to, description,
            cover_url, cover_mimetype, tags, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(track.guid.to_string())
    .bind(&track.mbid)
    .bind(&track.fid)
    .bind(&track.title)
    .bind(track.artist_id.to_string())
    .bind(track.album_id.map(|id| id.to_string()))
    .bind(track.position)
    .bind(track.disc_number)
    .bind(&track.license)
    .bind(&track.copyright)
    .bind(&track.attributed_to)
    .bind(&track.description)
    .bind(track.cover.as_ref().map(|c| c.url.clone()))
    .bind(track.cover.as_ref().map(|c| c.mimetype.clone()))
    .bind(tags_to_json(&track.tags))
    .bind(track.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

/// Load track by local guid
pub async fn load_track(conn: &mut SqliteConnection, guid: Uuid) -> Result<Option<Track>> {
    let row = sqlx::query("SELECT * FROM tracks WHERE guid = ?")
        .bind(guid.to_string())
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(Track::from_row).transpose()
}

/// Find track candidates by strong identifiers only.
///
/// The mbid predicate is constrained to the album's mbid when one is
/// supplied, so the same recording on a different release is not a match.
pub async fn find_track_candidates_by_ids(
    conn: &mut SqliteConnection,
    mbid: Option<&str>,
    album_mbid: Option<&str>,
    fid: Option<&str>,
) -> Result<Vec<Track>> {
    // The mbid predicate requires the album pair; a bare mbid is only
    // meaningful in the full composite query below
    let mbid_pair = mbid.filter(|_| album_mbid.is_some());
    if mbid_pair.is_none() && fid.is_none() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT * FROM tracks
        WHERE (?1 IS NOT NULL AND mbid = ?1
               AND album_id IN (SELECT guid FROM albums WHERE mbid = ?2))
           OR (?3 IS NOT NULL AND fid = ?3)
        ORDER BY rowid
        "#,
    )
    .bind(mbid_pair)
    .bind(album_mbid)
    .bind(fid)
    .fetch_all(conn)
    .await?;

    rows.iter().map(Track::from_row).collect()
}

/// Find track candidates for full resolution.
///
/// The composite `(title, artist, album, position, disc_number)` key is
/// the fallback when neither strong identifier is present, and is always
/// OR'd with the identifier predicates.
#[allow(clippy::too_many_arguments)]
pub async fn find_track_candidates(
    conn: &mut SqliteConnection,
    title: &str,
    artist_id: Uuid,
    album_id: Option<Uuid>,
    position: Option<i64>,
    disc_number: Option<i64>,
    mbid: Option<&str>,
    album_mbid: Option<&str>,
    fid: Option<&str>,
) -> Result<Vec<Track>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM tracks
        WHERE (lower(title) = lower(?1) AND artist_id = ?2
               AND album_id IS ?3 AND position IS ?4 AND disc_number IS ?5)
           OR (?6 IS NOT NULL AND ?7 IS NOT NULL AND mbid = ?6
               AND album_id IN (SELECT guid FROM albums WHERE mbid = ?7))
           OR (?6 IS NOT NULL AND ?7 IS NULL AND mbid = ?6)
           OR (?8 IS NOT NULL AND fid = ?8)
        ORDER BY rowid
        "#,
    )
    .bind(title)
    .bind(artist_id.to_string())
    .bind(album_id.map(|id| id.to_string()))
    .bind(position)
    .bind(disc_number)
    .bind(mbid)
    .bind(album_mbid)
    .bind(fid)
    .fetch_all(conn)
    .await?;

    rows.iter().map(Track::from_row).collect()
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

    fn track(title: &str, artist_id: Uuid) -> Track {
        Track {
            guid: Uuid::new_v4(),
            mbid: None,
            fid: None,
            title: title.to_string(),
            artist_id,
            album_id: None,
            position: None,
            disc_number: None,
            license: None,
            copyright: None,
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

        let t = track("Song", artist_id);
        insert_track(&mut conn, &t).await.expect("insert");

        let loaded = load_track(&mut conn, t.guid)
            .await
            .expect("load")
            .expect("track present");
        assert_eq!(loaded.title, "Song");
        assert!(loaded.album_id.is_none());
    }

    #[tokio::test]
    async fn test_composite_key_matches_null_album_and_position() {
        let pool = init_memory_pool().await.expect("pool");
        let mut conn = pool.acquire().await.expect("conn");
        let artist_id = seeded_artist(&mut conn).await;

        insert_track(&mut conn, &track("Song", artist_id))
            .await
            .expect("insert");

        // NULL album/position/disc must compare as equal, not as unknown
        let found = find_track_candidates(
            &mut conn, "song", artist_id, None, None, None, None, None, None,
        )
        .await
        .expect("query");
        assert_eq!(found.len(), 1);

        // Different position is a different composite key
        let found = find_track_candidates(
            &mut conn,
            "song",
            artist_id,
            None,
            Some(2),
            None,
            None,
            None,
            None,
        )
        .await
        .expect("query");
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_id_query_requires_album_pair_for_mbid() {
        let pool = init_memory_pool().await.expect("pool");
        let mut conn = pool.acquire().await.expect("conn");
        let artist_id = seeded_artist(&mut conn).await;

        let mut t = track("Song", artist_id);
        t.mbid = Some("track-mbid".to_string());
        insert_track(&mut conn, &t).await.expect("insert");

        // A bare track mbid without the album pair gives no candidates
        let found = find_track_candidates_by_ids(&mut conn, Some("track-mbid"), None, None)
            .await
            .expect("query");
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_fid_query_matches() {
        let pool = init_memory_pool().await.expect("pool");
        let mut conn = pool.acquire().await.expect("conn");
        let artist_id = seeded_artist(&mut conn).await;

        let mut t = track("Song", artist_id);
        t.fid = Some("https://x/track/1".to_string());
        insert_track(&mut conn, &t).await.expect("insert");

        let found =
            find_track_candidates_by_ids(&mut conn, None, None, Some("https://x/track/1"))
                .await
                .expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].guid, t.guid);
    }
}
