//! Entity resolution
//!
//! Folds canonical import records into the persistent Artist → Album →
//! Track graph. For each level the resolver either locates an existing
//! entity through the candidate store plus scoring, or creates a new one
//! from the record's defaults. Multiple matches never error; the
//! best-scored candidate wins, because the data source is untrusted and
//! partial. One resolution call (artist + album + track + enrichment)
//! runs inside a single transaction, so a failure partway leaves nothing
//! half-created.

pub mod scoring;

use cadenza_common::Error as CommonError;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::albums::{self, Album};
use crate::db::artists::{self, Artist};
use crate::db::tracks::{self, Track};
use crate::models::{AlbumRecord, ArtistRecord, EntityRef, ForcedValues, TrackRecord};
use crate::normalizer::licenses;
use scoring::{sort_candidates, IDENTIFIER_FIELDS};

/// Display strings are capped at the store's column limit before insert
const MAX_NAME_LENGTH: usize = 255;

/// Total time budget for re-running a resolution that lost a write lock
const LOCK_MAX_WAIT: Duration = Duration::from_millis(5_000);

/// Resolution failure
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A direct internal reference pointed at no stored entity
    #[error("Referenced entity not found: {0}")]
    ReferencedEntityNotFound(Uuid),

    /// The record cannot be resolved as supplied (e.g. no artists)
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Underlying store failure
    #[error(transparent)]
    Storage(#[from] CommonError),
}

impl From<sqlx::Error> for ResolveError {
    fn from(err: sqlx::Error) -> Self {
        ResolveError::Storage(CommonError::Database(err))
    }
}

impl ResolveError {
    fn is_database_locked(&self) -> bool {
        matches!(self, ResolveError::Storage(err) if err.is_database_locked())
    }
}

/// Re-run a resolution transaction that failed on a write lock.
///
/// Under WAL a concurrent writer makes the read-to-write upgrade fail
/// with SQLITE_BUSY before any unique constraint is checked, so the
/// losing transaction must be retried whole. Exponential backoff, 10ms
/// initial, 1s cap, bounded by `max_wait` total.
async fn retry_on_lock<T, F, Fut>(
    operation_name: &str,
    max_wait: Duration,
    mut operation: F,
) -> Result<T, ResolveError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ResolveError>>,
{
    let start = Instant::now();
    let mut attempt = 0u32;
    let mut backoff = Duration::from_millis(10);

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Resolution succeeded after lock retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_database_locked() && start.elapsed() < max_wait => {
                warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Database locked, will retry resolution"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(1));
            }
            Err(err) => return Err(err),
        }
    }
}

/// One resolved entity plus whether this call created it
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub entity: T,
    pub created: bool,
}

/// Full outcome of resolving one track record, bottom-up
#[derive(Debug, Clone)]
pub struct TrackResolution {
    pub track: Resolved<Track>,
    pub artist: Resolved<Artist>,
    pub album: Option<Resolved<Album>>,
}

impl TrackResolution {
    /// References to the entities this resolution created, in
    /// artist → album → track order
    pub fn created_refs(&self) -> Vec<EntityRef> {
        let mut refs = Vec::new();
        if self.artist.created {
            refs.push(EntityRef::Artist { id: self.artist.entity.guid });
        }
        if let Some(album) = &self.album {
            if album.created {
                refs.push(EntityRef::Album { id: album.entity.guid });
            }
        }
        if self.track.created {
            refs.push(EntityRef::Track { id: self.track.entity.guid });
        }
        refs
    }
}

/// Entity resolver over a SQLite-backed candidate store
#[derive(Clone)]
pub struct Resolver {
    pool: SqlitePool,
}

impl Resolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve one artist record inside its own transaction.
    ///
    /// A transaction that loses a write lock to a concurrent resolver
    /// is re-run rather than surfaced.
    pub async fn resolve_artist(
        &self,
        record: &ArtistRecord,
        attributed_to: Option<&str>,
    ) -> Result<Resolved<Artist>, ResolveError> {
        retry_on_lock("artist resolution", LOCK_MAX_WAIT, || async move {
            let mut tx = self.pool.begin().await?;
            let resolved = resolve_artist_inner(&mut tx, record, attributed_to).await?;
            tx.commit().await?;
            Ok(resolved)
        })
        .await
    }

    /// Resolve one track record, composing artist → album → track.
    ///
    /// `forced` values bypass normalization field-by-field; in particular
    /// `forced.track_ref` short-circuits all matching and returns the
    /// referenced track directly.
    pub async fn resolve_track(
        &self,
        record: &TrackRecord,
        forced: &ForcedValues,
        attributed_to: Option<&str>,
    ) -> Result<TrackResolution, ResolveError> {
        retry_on_lock("track resolution", LOCK_MAX_WAIT, || async move {
            let mut tx = self.pool.begin().await?;
            let resolution = resolve_track_inner(&mut tx, record, forced, attributed_to).await?;
            tx.commit().await?;
            Ok(resolution)
        })
        .await
    }
}

fn truncate(v: &str, max: usize) -> String {
    v.chars().take(max).collect()
}

fn created_at_from(fdate: Option<DateTime<Utc>>) -> DateTime<Utc> {
    fdate.unwrap_or_else(Utc::now)
}

/// Resolve or create an artist.
///
/// An mbid, when present, replaces the weak name predicate entirely; the
/// federation uri is always OR'd in. A losing concurrent insert on
/// mbid/fid is recovered by re-querying and reusing the winning row.
async fn resolve_artist_inner(
    conn: &mut SqliteConnection,
    record: &ArtistRecord,
    attributed_to: Option<&str>,
) -> Result<Resolved<Artist>, ResolveError> {
    let name_predicate = if record.mbid.is_some() {
        None
    } else {
        Some(record.name.as_str())
    };

    let candidates = artists::find_artist_candidates(
        conn,
        record.mbid.as_deref(),
        record.fid.as_deref(),
        name_predicate,
    )
    .await?;

    if !candidates.is_empty() {
        let best = sort_candidates(candidates, IDENTIFIER_FIELDS).remove(0);
        debug!(artist = %best.name, guid = %best.guid, "Matched existing artist");
        return Ok(Resolved { entity: best, created: false });
    }

    let artist = Artist {
        guid: Uuid::new_v4(),
        mbid: record.mbid.clone(),
        fid: record.fid.clone(),
        name: truncate(&record.name, MAX_NAME_LENGTH),
        attributed_to: record
            .attributed_to
            .clone()
            .or_else(|| attributed_to.map(String::from)),
        description: record.description.clone(),
        cover: record.cover_data.clone(),
        tags: record.tags.clone(),
        created_at: created_at_from(record.fdate),
    };

    match artists::insert_artist(conn, &artist).await {
        Ok(()) => {
            debug!(artist = %artist.name, guid = %artist.guid, "Created artist");
            Ok(Resolved { entity: artist, created: true })
        }
        Err(err) if err.is_unique_violation() => {
            // Another writer created this identifier first; reuse its row
            let candidates = artists::find_artist_candidates(
                conn,
                record.mbid.as_deref(),
                record.fid.as_deref(),
                name_predicate,
            )
            .await?;
            let best = sort_candidates(candidates, IDENTIFIER_FIELDS)
                .into_iter()
                .next()
                .ok_or(ResolveError::Storage(err))?;
            debug!(artist = %best.name, guid = %best.guid, "Reused concurrently created artist");
            Ok(Resolved { entity: best, created: false })
        }
        Err(err) => Err(err.into()),
    }
}

/// Resolve the artist owning the album.
///
/// Falls back from the album's own artist list to the track's, and
/// reuses the track artist when the names coincide case-insensitively.
async fn resolve_album_artist(
    conn: &mut SqliteConnection,
    record: &TrackRecord,
    album_record: &AlbumRecord,
    track_artist: &Artist,
    attributed_to: Option<&str>,
) -> Result<Resolved<Artist>, ResolveError> {
    let album_artists: &[ArtistRecord] = if album_record.artists.is_empty() {
        &record.artists
    } else {
        &album_record.artists
    };
    let Some(album_artist_record) = album_artists.first() else {
        return Ok(Resolved { entity: track_artist.clone(), created: false });
    };

    if album_artist_record.name.eq_ignore_ascii_case(&track_artist.name) {
        return Ok(Resolved { entity: track_artist.clone(), created: false });
    }

    // Unlike plain artist resolution, the name predicate stays in the
    // disjunction even when an mbid is present
    let candidates = artists::find_artist_candidates(
        conn,
        album_artist_record.mbid.as_deref(),
        album_artist_record.fid.as_deref(),
        Some(album_artist_record.name.as_str()),
    )
    .await?;

    if !candidates.is_empty() {
        let best = sort_candidates(candidates, IDENTIFIER_FIELDS).remove(0);
        return Ok(Resolved { entity: best, created: false });
    }

    resolve_artist_inner(conn, album_artist_record, attributed_to).await
}

/// Resolve or create an album under its owning artist
async fn resolve_album_inner(
    conn: &mut SqliteConnection,
    album_record: &AlbumRecord,
    album_mbid: Option<&str>,
    album_artist: &Artist,
    attributed_to: Option<&str>,
) -> Result<Resolved<Album>, ResolveError> {
    let candidates = albums::find_album_candidates(
        conn,
        album_mbid,
        album_record.fid.as_deref(),
        Some((album_record.title.as_str(), album_artist.guid)),
    )
    .await?;

    if !candidates.is_empty() {
        let best = sort_candidates(candidates, IDENTIFIER_FIELDS).remove(0);
        debug!(album = %best.title, guid = %best.guid, "Matched existing album");
        return Ok(Resolved { entity: best, created: false });
    }

    let album = Album {
        guid: Uuid::new_v4(),
        mbid: album_mbid.map(String::from),
        fid: album_record.fid.clone(),
        title: truncate(&album_record.title, MAX_NAME_LENGTH),
        artist_id: album_artist.guid,
        release_date: album_record.release_date,
        attributed_to: album_record
            .attributed_to
            .clone()
            .or_else(|| attributed_to.map(String::from)),
        description: album_record.description.clone(),
        cover: album_record.cover_data.clone(),
        tags: album_record.tags.clone(),
        created_at: created_at_from(album_record.fdate),
    };

    match albums::insert_album(conn, &album).await {
        Ok(()) => {
            debug!(album = %album.title, guid = %album.guid, "Created album");
            Ok(Resolved { entity: album, created: true })
        }
        Err(err) if err.is_unique_violation() => {
            let candidates = albums::find_album_candidates(
                conn,
                album_mbid,
                album_record.fid.as_deref(),
                Some((album_record.title.as_str(), album_artist.guid)),
            )
            .await?;
            let best = sort_candidates(candidates, IDENTIFIER_FIELDS)
                .into_iter()
                .next()
                .ok_or(ResolveError::Storage(err))?;
            Ok(Resolved { entity: best, created: false })
        }
        Err(err) => Err(err.into()),
    }
}

/// Load the artist/album referenced by an existing track, for reporting
/// a fast-path hit in the same shape as a full resolution
async fn resolution_from_existing(
    conn: &mut SqliteConnection,
    track: Track,
) -> Result<TrackResolution, ResolveError> {
    let artist = artists::load_artist(conn, track.artist_id)
        .await?
        .ok_or(ResolveError::ReferencedEntityNotFound(track.artist_id))?;
    let album = match track.album_id {
        Some(album_id) => Some(
            albums::load_album(conn, album_id)
                .await?
                .ok_or(ResolveError::ReferencedEntityNotFound(album_id))?,
        ),
        None => None,
    };

    Ok(TrackResolution {
        track: Resolved { entity: track, created: false },
        artist: Resolved { entity: artist, created: false },
        album: album.map(|a| Resolved { entity: a, created: false }),
    })
}

async fn resolve_track_inner(
    conn: &mut SqliteConnection,
    record: &TrackRecord,
    forced: &ForcedValues,
    attributed_to: Option<&str>,
) -> Result<TrackResolution, ResolveError> {
    // Fast path: a direct local-identity reference skips all matching
    if let Some(track_ref) = forced.track_ref {
        let track = tracks::load_track(conn, track_ref)
            .await?
            .ok_or(ResolveError::ReferencedEntityNotFound(track_ref))?;
        debug!(guid = %track.guid, "Resolved track via local reference");
        return resolution_from_existing(conn, track).await;
    }

    let track_mbid = match &forced.mbid {
        Some(forced_mbid) => forced_mbid.clone(),
        None => record.mbid.clone(),
    };
    // A forced album means the record's nested album (and its mbid) is
    // not consulted
    let album_mbid = if forced.album_ref.is_some() {
        None
    } else {
        record.album.as_ref().and_then(|a| a.mbid.clone())
    };
    let track_fid = record.fid.as_deref();

    // Strong-identifier pre-query: an (mbid, album mbid) pair or a
    // federation uri settles resolution without touching artist/album
    if (track_mbid.is_some() && album_mbid.is_some()) || track_fid.is_some() {
        let candidates = tracks::find_track_candidates_by_ids(
            conn,
            track_mbid.as_deref(),
            album_mbid.as_deref(),
            track_fid,
        )
        .await?;
        if !candidates.is_empty() {
            let best = sort_candidates(candidates, IDENTIFIER_FIELDS).remove(0);
            debug!(guid = %best.guid, "Matched track by identifier pre-query");
            return resolution_from_existing(conn, best).await;
        }
    }

    // Bottom-up: artist first
    let artist = match forced.artist_ref {
        Some(artist_ref) => {
            let artist = artists::load_artist(conn, artist_ref)
                .await?
                .ok_or(ResolveError::ReferencedEntityNotFound(artist_ref))?;
            Resolved { entity: artist, created: false }
        }
        None => {
            let artist_record = record.artists.first().ok_or_else(|| {
                ResolveError::InvalidRecord("track record has no artists".to_string())
            })?;
            resolve_artist_inner(conn, artist_record, attributed_to).await?
        }
    };

    // Then the album, owned by the album artist
    let album = match &forced.album_ref {
        Some(Some(album_ref)) => {
            let album = albums::load_album(conn, *album_ref)
                .await?
                .ok_or(ResolveError::ReferencedEntityNotFound(*album_ref))?;
            Some(Resolved { entity: album, created: false })
        }
        Some(None) => None,
        None => match &record.album {
            Some(album_record) => {
                let album_artist = if forced.artist_ref.is_some() {
                    Resolved { entity: artist.entity.clone(), created: false }
                } else {
                    resolve_album_artist(
                        conn,
                        record,
                        album_record,
                        &artist.entity,
                        attributed_to,
                    )
                    .await?
                };
                Some(
                    resolve_album_inner(
                        conn,
                        album_record,
                        album_mbid.as_deref(),
                        &album_artist.entity,
                        attributed_to,
                    )
                    .await?,
                )
            }
            None => None,
        },
    };

    // Field-by-field forced overrides, falling back to the record
    let title = forced
        .title
        .clone()
        .unwrap_or_else(|| record.title.clone());
    let title = truncate(&title, MAX_NAME_LENGTH);
    let position = forced.position.or(record.position);
    let disc_number = match &forced.disc_number {
        Some(forced_disc) => *forced_disc,
        None => record.disc_number,
    };
    let license = match &forced.license {
        Some(forced_license) => forced_license.clone(),
        None => licenses::match_license(record.license.as_deref(), record.copyright.as_deref())
            .map(|l| l.code.to_string()),
    };
    let copyright = match &forced.copyright {
        Some(forced_copyright) => forced_copyright.clone(),
        None => record.copyright.clone(),
    };
    let description = match &forced.description {
        Some(forced_description) => forced_description.clone(),
        None => record.description.clone(),
    };
    let cover = match &forced.cover {
        Some(forced_cover) => forced_cover.clone(),
        None => record.cover_data.clone(),
    };

    // Candidate query runs against the first-credited artist, before any
    // featuring switch
    let album_entity = album.as_ref().map(|a| &a.entity);
    let candidates = tracks::find_track_candidates(
        conn,
        &title,
        artist.entity.guid,
        album_entity.map(|a| a.guid),
        position,
        disc_number,
        track_mbid.as_deref(),
        album_mbid.as_deref(),
        track_fid,
    )
    .await?;

    if !candidates.is_empty() {
        let best = sort_candidates(candidates, IDENTIFIER_FIELDS).remove(0);
        debug!(guid = %best.guid, title = %best.title, "Matched existing track");
        return Ok(TrackResolution {
            track: Resolved { entity: best, created: false },
            artist,
            album,
        });
    }

    // A second credited artist becomes the track's own artist, so the
    // album keeps the first while the featuring credit survives
    let track_artist = if album.is_some() && record.artists.len() > 1 {
        resolve_artist_inner(conn, &record.artists[1], attributed_to).await?
    } else {
        artist.clone()
    };

    let track = Track {
        guid: Uuid::new_v4(),
        mbid: track_mbid.clone(),
        fid: record.fid.clone(),
        title,
        artist_id: track_artist.entity.guid,
        album_id: album.as_ref().map(|a| a.entity.guid),
        position,
        disc_number,
        license,
        copyright,
        attributed_to: record
            .attributed_to
            .clone()
            .or_else(|| attributed_to.map(String::from)),
        description,
        cover,
        tags: forced.tags.clone().unwrap_or_else(|| record.tags.clone()),
        created_at: created_at_from(record.fdate),
    };

    let track = match tracks::insert_track(conn, &track).await {
        Ok(()) => {
            debug!(guid = %track.guid, title = %track.title, "Created track");
            Resolved { entity: track, created: true }
        }
        Err(err) if err.is_unique_violation() => {
            let candidates = tracks::find_track_candidates(
                conn,
                &track.title,
                artist.entity.guid,
                album.as_ref().map(|a| a.entity.guid),
                position,
                disc_number,
                track_mbid.as_deref(),
                album_mbid.as_deref(),
                track_fid,
            )
            .await?;
            let best = sort_candidates(candidates, IDENTIFIER_FIELDS)
                .into_iter()
                .next()
                .ok_or(ResolveError::Storage(err))?;
            Resolved { entity: best, created: false }
        }
        Err(err) => return Err(err.into()),
    };

    Ok(TrackResolution { track, artist: track_artist, album })
}
