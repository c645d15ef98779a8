//! Data models for cadenza-ingest

pub mod record;
pub mod scan_job;

pub use record::{AlbumRecord, ArtistRecord, CoverData, EntityRef, ForcedValues, TrackRecord};
pub use scan_job::{ScanJob, ScanStatus};
