//! # Cadenza Common Library
//!
//! Shared code for the cadenza ingest services:
//! - Common error type
//! - Configuration loading

pub mod config;
pub mod error;

pub use error::{Error, Result};
