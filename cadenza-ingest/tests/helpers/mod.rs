//! Test helper utilities
//!
//! Shared fixtures for cadenza-ingest integration tests: an in-memory
//! candidate store and a scripted in-process catalog.

// Each test binary uses its own subset of these fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;

use cadenza_ingest::scan::{CatalogPage, FetchError, FirstPage, RemoteCatalog};

/// In-memory database with the full schema applied
pub async fn create_test_pool() -> SqlitePool {
    cadenza_ingest::db::init_memory_pool()
        .await
        .expect("in-memory pool")
}

/// Minimal valid federation track item
pub fn track_item(title: &str, artist: &str, artist_fid: &str) -> Value {
    json!({
        "name": title,
        "artists": [{"name": artist, "id": artist_fid}],
        "album": null
    })
}

/// Federation track item with an album block
pub fn track_item_with_album(
    title: &str,
    artist: &str,
    album_title: &str,
) -> Value {
    json!({
        "name": title,
        "artists": [{"name": artist}],
        "album": {
            "name": album_title,
            "artists": [{"name": artist}]
        }
    })
}

/// Catalog fake serving a fixed first page and a scripted page map.
///
/// Each `fetch_page` call on a URL pops the next scripted outcome for
/// that URL, so transient failures followed by success can be expressed
/// per page.
pub struct FakeCatalog {
    first: FirstPage,
    pages: std::sync::Mutex<HashMap<String, Vec<Result<CatalogPage, FetchError>>>>,
}

impl FakeCatalog {
    pub fn new(total_items: i64, first_page_url: &str) -> Self {
        Self {
            first: FirstPage {
                total_items,
                first_page_url: first_page_url.to_string(),
            },
            pages: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_page(self, url: &str, items: Vec<Value>, next: Option<&str>) -> Self {
        self.push_outcome(
            url,
            Ok(CatalogPage {
                items,
                next_page_url: next.map(String::from),
            }),
        );
        self
    }

    pub fn with_failure(self, url: &str, error: FetchError) -> Self {
        self.push_outcome(url, Err(error));
        self
    }

    fn push_outcome(&self, url: &str, outcome: Result<CatalogPage, FetchError>) {
        self.pages
            .lock()
            .expect("page map lock")
            .entry(url.to_string())
            .or_default()
            .push(outcome);
    }

    pub fn into_arc(self) -> Arc<dyn RemoteCatalog> {
        Arc::new(self)
    }
}

#[async_trait]
impl RemoteCatalog for FakeCatalog {
    async fn fetch_first_page(
        &self,
        _catalog_url: &str,
        _actor: &str,
    ) -> Result<FirstPage, FetchError> {
        Ok(self.first.clone())
    }

    async fn fetch_page(&self, page_url: &str, _actor: &str) -> Result<CatalogPage, FetchError> {
        let mut pages = self.pages.lock().expect("page map lock");
        let outcomes = pages
            .get_mut(page_url)
            .ok_or_else(|| FetchError::Permanent(format!("No script for {}", page_url)))?;
        if outcomes.is_empty() {
            return Err(FetchError::Permanent(format!(
                "Script exhausted for {}",
                page_url
            )));
        }
        outcomes.remove(0)
    }
}
