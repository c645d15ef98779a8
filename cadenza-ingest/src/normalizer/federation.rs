//! Federation payload normalization
//!
//! Converts an already-parsed federation metadata dictionary (one item of
//! a remote catalog page) into the canonical track record. The transport
//! and wire format are the remote catalog client's concern; this module
//! only consumes JSON values.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use super::NormalizeError;
use crate::models::{AlbumRecord, ArtistRecord, CoverData, TrackRecord};

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn required_str<'a>(value: &'a Value, key: &'static str) -> Result<&'a str, NormalizeError> {
    str_field(value, key).ok_or(NormalizeError::MissingField(key))
}

fn parse_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|s| s.parse().ok())
}

/// Cover reference from an `image` object, accepting both `url` and
/// `href` spellings
fn cover_from(value: &Value, key: &str) -> Option<CoverData> {
    let image = value.get(key)?;
    let url = str_field(image, "url").or_else(|| str_field(image, "href"))?;
    let mimetype = str_field(image, "mediaType")?;
    Some(CoverData {
        url: url.to_string(),
        mimetype: mimetype.to_string(),
    })
}

/// Tag names from a `tags` list of `{name}` objects
fn tags_from(value: &Value) -> Vec<String> {
    value
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| str_field(t, "name"))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn artist_record(value: &Value) -> Result<ArtistRecord, NormalizeError> {
    Ok(ArtistRecord {
        name: required_str(value, "name")?.to_string(),
        mbid: str_field(value, "musicbrainzId").map(String::from),
        fid: str_field(value, "id").map(String::from),
        fdate: parse_datetime(str_field(value, "published")),
        description: str_field(value, "description").map(String::from),
        attributed_to: str_field(value, "attributedTo").map(String::from),
        cover_data: cover_from(value, "image"),
        tags: tags_from(value),
    })
}

fn album_record(value: &Value) -> Result<AlbumRecord, NormalizeError> {
    let artists = value
        .get("artists")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(artist_record).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    Ok(AlbumRecord {
        title: required_str(value, "name")?.to_string(),
        mbid: str_field(value, "musicbrainzId").map(String::from),
        fid: str_field(value, "id").map(String::from),
        fdate: parse_datetime(str_field(value, "published")),
        release_date: parse_date(str_field(value, "released")),
        description: str_field(value, "description").map(String::from),
        attributed_to: str_field(value, "attributedTo").map(String::from),
        cover_data: cover_from(value, "image"),
        tags: tags_from(value),
        artists,
    })
}

/// Normalize one federation track payload into a canonical record.
///
/// Fields absent from the payload stay `None`; a missing track or artist
/// name is the only hard failure.
pub fn track_record(payload: &Value) -> Result<TrackRecord, NormalizeError> {
    let artists = payload
        .get("artists")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(artist_record).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let album = match payload.get("album") {
        Some(Value::Null) | None => None,
        Some(album) => Some(album_record(album)?),
    };

    Ok(TrackRecord {
        title: required_str(payload, "name")?.to_string(),
        position: Some(payload.get("position").and_then(Value::as_i64).unwrap_or(1)),
        disc_number: payload.get("disc").and_then(Value::as_i64),
        license: str_field(payload, "license").map(String::from),
        copyright: str_field(payload, "copyright").map(String::from),
        description: str_field(payload, "description").map(String::from),
        attributed_to: str_field(payload, "attributedTo").map(String::from),
        mbid: str_field(payload, "musicbrainzId").map(String::from),
        fid: str_field(payload, "id").map(String::from),
        fdate: parse_datetime(str_field(payload, "published")),
        cover_data: cover_from(payload, "image"),
        tags: tags_from(payload),
        album,
        artists,
    })
}
