//! Local file tag normalization
//!
//! Converts tag data extracted from a locally uploaded audio file into
//! the canonical track record. Tag extraction itself (ID3 and friends)
//! happens upstream; this module only reshapes what the extractor found.

use super::NormalizeError;
use crate::models::{AlbumRecord, ArtistRecord, TrackRecord};

/// Tag data from one local audio file
#[derive(Debug, Clone, Default)]
pub struct LocalTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artist_mbid: Option<String>,
    pub album_title: Option<String>,
    pub album_mbid: Option<String>,
    pub album_artist: Option<String>,
    pub album_artist_mbid: Option<String>,
    pub release_date: Option<chrono::NaiveDate>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub mbid: Option<String>,
    pub license: Option<String>,
    pub copyright: Option<String>,
    pub genres: Vec<String>,
}

/// Normalize local file tags into a canonical record.
///
/// Title and artist are required; everything else degrades to absent.
pub fn track_record(tags: &LocalTags) -> Result<TrackRecord, NormalizeError> {
    let title = tags
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .ok_or(NormalizeError::MissingField("title"))?;
    let artist_name = tags
        .artist
        .clone()
        .filter(|a| !a.trim().is_empty())
        .ok_or(NormalizeError::MissingField("artist"))?;

    let album = tags
        .album_title
        .as_ref()
        .filter(|t| !t.trim().is_empty())
        .map(|album_title| {
            let album_artists = tags
                .album_artist
                .as_ref()
                .filter(|a| !a.trim().is_empty())
                .map(|name| {
                    vec![ArtistRecord {
                        name: name.clone(),
                        mbid: tags.album_artist_mbid.clone(),
                        ..Default::default()
                    }]
                })
                .unwrap_or_default();

            AlbumRecord {
                title: album_title.clone(),
                mbid: tags.album_mbid.clone(),
                release_date: tags.release_date,
                artists: album_artists,
                ..Default::default()
            }
        });

    Ok(TrackRecord {
        title,
        position: tags.track_number,
        disc_number: tags.disc_number,
        license: tags.license.clone(),
        copyright: tags.copyright.clone(),
        mbid: tags.mbid.clone(),
        tags: tags.genres.clone(),
        album,
        artists: vec![ArtistRecord {
            name: artist_name,
            mbid: tags.artist_mbid.clone(),
            ..Default::default()
        }],
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_tags_normalize() {
        let tags = LocalTags {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            ..Default::default()
        };
        let record = track_record(&tags).expect("normalize");
        assert_eq!(record.title, "Song");
        assert_eq!(record.artists.len(), 1);
        assert!(record.album.is_none());
        assert!(record.fid.is_none());
    }

    #[test]
    fn test_album_artist_carried_separately() {
        let tags = LocalTags {
            title: Some("Song".to_string()),
            artist: Some("Featured Guest".to_string()),
            album_title: Some("Album".to_string()),
            album_artist: Some("Main Band".to_string()),
            track_number: Some(4),
            ..Default::default()
        };
        let record = track_record(&tags).expect("normalize");
        let album = record.album.expect("album");
        assert_eq!(album.artists[0].name, "Main Band");
        assert_eq!(record.artists[0].name, "Featured Guest");
        assert_eq!(record.position, Some(4));
    }

    #[test]
    fn test_missing_artist_fails() {
        let tags = LocalTags {
            title: Some("Song".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            track_record(&tags),
            Err(NormalizeError::MissingField("artist"))
        ));
    }

    #[test]
    fn test_blank_album_title_is_no_album() {
        let tags = LocalTags {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            album_title: Some("   ".to_string()),
            ..Default::default()
        };
        let record = track_record(&tags).expect("normalize");
        assert!(record.album.is_none());
    }
}
