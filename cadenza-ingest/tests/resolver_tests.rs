//! Resolver integration tests
//!
//! Exercise the public library surface end to end: federation payloads
//! through the normalizer into the resolver, verified against the store.

mod helpers;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use cadenza_ingest::db::artists::{insert_artist, Artist};
use cadenza_ingest::models::ForcedValues;
use cadenza_ingest::normalizer::federation;
use cadenza_ingest::Resolver;
use helpers::create_test_pool;

async fn count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count query")
}

#[tokio::test]
async fn test_federation_payload_resolves_end_to_end() {
    let pool = create_test_pool().await;
    let resolver = Resolver::new(pool.clone());

    let payload = json!({
        "name": "Song",
        "artists": [{"name": "Band", "id": "https://peer.example/artists/1"}],
        "album": null
    });
    let record = federation::track_record(&payload).expect("normalize");

    let resolution = resolver
        .resolve_track(&record, &ForcedValues::default(), None)
        .await
        .expect("resolve");

    assert!(resolution.track.created);
    assert!(resolution.artist.created);
    assert!(resolution.album.is_none());
    assert_eq!(resolution.track.entity.title, "Song");
    assert_eq!(resolution.artist.entity.name, "Band");
    assert_eq!(
        resolution.artist.entity.fid.as_deref(),
        Some("https://peer.example/artists/1")
    );
    assert_eq!(resolution.track.entity.artist_id, resolution.artist.entity.guid);

    assert_eq!(count(&pool, "artists").await, 1);
    assert_eq!(count(&pool, "tracks").await, 1);
    assert_eq!(count(&pool, "albums").await, 0);
}

#[tokio::test]
async fn test_resolving_same_payload_twice_reuses_entities() {
    let pool = create_test_pool().await;
    let resolver = Resolver::new(pool.clone());

    let payload = json!({
        "name": "Song",
        "artists": [{"name": "Band", "id": "https://peer.example/artists/1"}],
        "album": null
    });
    let record = federation::track_record(&payload).expect("normalize");

    let first = resolver
        .resolve_track(&record, &ForcedValues::default(), None)
        .await
        .expect("first resolve");
    let second = resolver
        .resolve_track(&record, &ForcedValues::default(), None)
        .await
        .expect("second resolve");

    assert!(first.track.created);
    assert!(!second.track.created);
    assert!(!second.artist.created);
    assert_eq!(first.track.entity.guid, second.track.entity.guid);

    assert_eq!(count(&pool, "artists").await, 1);
    assert_eq!(count(&pool, "tracks").await, 1);
}

#[tokio::test]
async fn test_album_payload_creates_scoped_album() {
    let pool = create_test_pool().await;
    let resolver = Resolver::new(pool.clone());

    let payload = json!({
        "name": "Opening",
        "artists": [{"name": "Band"}],
        "album": {
            "name": "Debut",
            "artists": [{"name": "Band"}]
        }
    });
    let record = federation::track_record(&payload).expect("normalize");

    let resolution = resolver
        .resolve_track(&record, &ForcedValues::default(), None)
        .await
        .expect("resolve");

    let album = resolution.album.expect("album resolved");
    assert!(album.created);
    assert_eq!(album.entity.title, "Debut");
    assert_eq!(album.entity.artist_id, resolution.artist.entity.guid);
    assert_eq!(resolution.track.entity.album_id, Some(album.entity.guid));
    assert_eq!(count(&pool, "albums").await, 1);
}

#[tokio::test]
async fn test_artist_reuse_is_case_insensitive() {
    let pool = create_test_pool().await;
    let resolver = Resolver::new(pool.clone());

    let lower = federation::track_record(&json!({
        "name": "First",
        "artists": [{"name": "the band"}]
    }))
    .expect("normalize");
    let upper = federation::track_record(&json!({
        "name": "Second",
        "artists": [{"name": "The Band"}]
    }))
    .expect("normalize");

    let first = resolver
        .resolve_track(&lower, &ForcedValues::default(), None)
        .await
        .expect("first resolve");
    let second = resolver
        .resolve_track(&upper, &ForcedValues::default(), None)
        .await
        .expect("second resolve");

    assert!(!second.artist.created);
    assert_eq!(first.artist.entity.guid, second.artist.entity.guid);
    assert_eq!(count(&pool, "artists").await, 1);
}

#[tokio::test]
async fn test_identifier_match_outranks_name_match() {
    let pool = create_test_pool().await;

    // Two stored artists both satisfy the lookup disjunction: one only
    // by name, one by federation uri. The uri match must win.
    let name_only = Artist {
        guid: Uuid::new_v4(),
        mbid: None,
        fid: None,
        name: "Band".to_string(),
        attributed_to: None,
        description: None,
        cover: None,
        tags: vec![],
        created_at: Utc::now(),
    };
    let by_fid = Artist {
        guid: Uuid::new_v4(),
        mbid: None,
        fid: Some("https://peer.example/artists/1".to_string()),
        name: "Renamed Band".to_string(),
        attributed_to: None,
        description: None,
        cover: None,
        tags: vec![],
        created_at: Utc::now(),
    };
    {
        let mut conn = pool.acquire().await.expect("conn");
        insert_artist(&mut conn, &name_only).await.expect("insert");
        insert_artist(&mut conn, &by_fid).await.expect("insert");
    }

    let resolver = Resolver::new(pool.clone());
    let record = federation::track_record(&json!({
        "name": "Song",
        "artists": [{"name": "Band", "id": "https://peer.example/artists/1"}]
    }))
    .expect("normalize");

    let resolution = resolver
        .resolve_track(&record, &ForcedValues::default(), None)
        .await
        .expect("resolve");

    assert!(!resolution.artist.created);
    assert_eq!(resolution.artist.entity.guid, by_fid.guid);
    assert_eq!(count(&pool, "artists").await, 2);
}

#[tokio::test]
async fn test_concurrent_resolution_converges_without_errors() {
    // File-backed pool so resolutions genuinely contend for the write
    // lock across connections
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = cadenza_ingest::db::init_database_pool(&dir.path().join("cadenza.db"))
        .await
        .expect("pool");

    let record = federation::track_record(&json!({
        "name": "Song",
        "musicbrainzId": "33333333-3333-3333-3333-333333333333",
        "artists": [{
            "name": "Band",
            "musicbrainzId": "44444444-4444-4444-4444-444444444444"
        }]
    }))
    .expect("normalize");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let resolver = Resolver::new(pool.clone());
        let record = record.clone();
        handles.push(tokio::spawn(async move {
            resolver
                .resolve_track(&record, &ForcedValues::default(), None)
                .await
        }));
    }

    // Every racer must come back with the same entity, lock contention
    // and losing inserts absorbed internally
    let mut track_guids = Vec::new();
    for handle in handles {
        let resolution = handle.await.expect("join").expect("resolve");
        track_guids.push(resolution.track.entity.guid);
    }
    track_guids.dedup();
    assert_eq!(track_guids.len(), 1);

    assert_eq!(count(&pool, "artists").await, 1);
    assert_eq!(count(&pool, "tracks").await, 1);
}

#[tokio::test]
async fn test_enrichment_applies_only_at_creation() {
    let pool = create_test_pool().await;
    let resolver = Resolver::new(pool.clone());

    let plain = federation::track_record(&json!({
        "name": "Song",
        "id": "https://peer.example/tracks/1",
        "artists": [{"name": "Band"}]
    }))
    .expect("normalize");
    let enriched = federation::track_record(&json!({
        "name": "Song",
        "id": "https://peer.example/tracks/1",
        "tags": [{"name": "rock"}],
        "image": {"url": "https://x/c.jpg", "mediaType": "image/jpeg"},
        "artists": [{"name": "Band"}]
    }))
    .expect("normalize");

    let first = resolver
        .resolve_track(&plain, &ForcedValues::default(), None)
        .await
        .expect("first resolve");
    let second = resolver
        .resolve_track(&enriched, &ForcedValues::default(), None)
        .await
        .expect("second resolve");

    // The later payload's tags and cover never reach the existing row
    assert!(!second.track.created);
    assert_eq!(first.track.entity.guid, second.track.entity.guid);
    assert!(second.track.entity.tags.is_empty());
    assert!(second.track.entity.cover.is_none());
}
