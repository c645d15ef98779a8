//! cadenza-ingest library interface
//!
//! Music metadata reconciliation: normalizes track descriptions from
//! federation payloads or local file tags into canonical artist, album
//! and track entities, and crawls remote catalogs page by page.

pub mod db;
pub mod models;
pub mod normalizer;
pub mod resolver;
pub mod scan;

pub use crate::resolver::{Resolved, Resolver, TrackResolution};
pub use crate::scan::{ScanPipeline, ScanPolicy};
