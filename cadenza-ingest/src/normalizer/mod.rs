//! Metadata normalization
//!
//! Three input shapes converge into the canonical record consumed by the
//! resolver: federation payloads, local file tags, and caller-forced
//! values (which apply later, inside resolution, field-by-field).

pub mod federation;
pub mod licenses;
pub mod local;

use thiserror::Error;

/// Normalization failure for one import record
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A field the canonical record cannot do without
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
