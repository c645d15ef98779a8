//! Remote catalog scanning

pub mod client;
pub mod pipeline;

pub use client::{CatalogPage, FetchError, FirstPage, HttpCatalog, RemoteCatalog};
pub use pipeline::{ScanPipeline, ScanPolicy};
