//! Canonical import record shapes
//!
//! Every metadata source (federation payload, local file tags, forced
//! values) is normalized into these structures before resolution. A field
//! that the source did not supply stays `None`, so the resolver can tell
//! "not supplied" apart from "explicitly empty".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cover image metadata carried alongside a record.
///
/// Only the reference is stored; fetching/attaching binary image data is
/// the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverData {
    pub url: String,
    pub mimetype: String,
}

/// One artist entry in a canonical record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub name: String,
    /// External catalog UUID (strong match key)
    pub mbid: Option<String>,
    /// Federation URI (strong match key)
    pub fid: Option<String>,
    /// Creation date hint from the remote peer; backdates `created_at`
    pub fdate: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub attributed_to: Option<String>,
    pub cover_data: Option<CoverData>,
    pub tags: Vec<String>,
}

/// Nested album record, carrying its own artist list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub title: String,
    pub mbid: Option<String>,
    pub fid: Option<String>,
    pub fdate: Option<DateTime<Utc>>,
    pub release_date: Option<chrono::NaiveDate>,
    pub description: Option<String>,
    pub attributed_to: Option<String>,
    pub cover_data: Option<CoverData>,
    pub tags: Vec<String>,
    /// Album artists; empty means "fall back to the track's artists"
    pub artists: Vec<ArtistRecord>,
}

/// Canonical track import record, the resolver's sole input shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackRecord {
    pub title: String,
    pub position: Option<i64>,
    pub disc_number: Option<i64>,
    /// Raw license text/URL from the source; matched against the license
    /// table during resolution
    pub license: Option<String>,
    pub copyright: Option<String>,
    pub description: Option<String>,
    pub attributed_to: Option<String>,
    pub mbid: Option<String>,
    pub fid: Option<String>,
    pub fdate: Option<DateTime<Utc>>,
    pub cover_data: Option<CoverData>,
    pub tags: Vec<String>,
    pub album: Option<AlbumRecord>,
    /// Track artists in credit order; the first owns the album, a second
    /// entry (if any) is the track's own artist (featuring credit)
    pub artists: Vec<ArtistRecord>,
}

/// Caller-supplied values that bypass normalization field-by-field.
///
/// Used by programmatic creation (e.g. a manual upload) to force specific
/// fields while the rest of the record still goes through normal
/// derivation.
#[derive(Debug, Clone, Default)]
pub struct ForcedValues {
    /// Direct local-identity shortcut: resolution returns this track
    /// unconditionally, skipping all matching
    pub track_ref: Option<Uuid>,
    /// Already-resolved artist to use for both album and track
    pub artist_ref: Option<Uuid>,
    /// Already-resolved album to place the track on (`Some(None)` forces
    /// "no album")
    pub album_ref: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub mbid: Option<Option<String>>,
    pub position: Option<i64>,
    pub disc_number: Option<Option<i64>>,
    pub license: Option<Option<String>>,
    pub copyright: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub cover: Option<Option<CoverData>>,
    pub tags: Option<Vec<String>>,
}

/// Reference to one persisted entity, tagged by level.
///
/// Enrichment (tags, description, cover) targets one of these instead of
/// any polymorphic/reflective dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityRef {
    Artist { id: Uuid },
    Album { id: Uuid },
    Track { id: Uuid },
}

impl EntityRef {
    pub fn id(&self) -> Uuid {
        match self {
            EntityRef::Artist { id } | EntityRef::Album { id } | EntityRef::Track { id } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_stay_none() {
        let record = TrackRecord {
            title: "Song".to_string(),
            ..Default::default()
        };
        assert!(record.mbid.is_none());
        assert!(record.position.is_none());
        assert!(record.album.is_none());
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_entity_ref_id() {
        let id = Uuid::new_v4();
        assert_eq!(EntityRef::Album { id }.id(), id);
    }

    #[test]
    fn test_entity_ref_serialization_carries_kind() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(EntityRef::Track { id }).expect("serialize");
        assert_eq!(json["kind"], "track");
    }
}
