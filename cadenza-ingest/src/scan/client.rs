//! Remote catalog client
//!
//! Fetches pages of a remote peer's catalog. Errors are classified here,
//! at the collaborator boundary: transient (network-class, worth a
//! retry) versus permanent (the remote answered, but with an error or an
//! unusable payload).

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Fetch failure, classified for the retry policy
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout/connection-class failure; the scheduler may retry
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// The remote answered with an error; retrying won't help
    #[error("Permanent fetch failure: {0}")]
    Permanent(String),
}

/// First-page metadata of a catalog
#[derive(Debug, Clone)]
pub struct FirstPage {
    /// Total item count the catalog reports
    pub total_items: i64,
    /// URL of the first content page
    pub first_page_url: String,
}

/// One content page of a catalog
#[derive(Debug, Clone)]
pub struct CatalogPage {
    /// Raw federation items, already parsed from the wire
    pub items: Vec<Value>,
    /// Next page link, if the catalog declares one
    pub next_page_url: Option<String>,
}

/// Read access to a remote catalog
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Open the catalog: report its size and first page URL
    async fn fetch_first_page(
        &self,
        catalog_url: &str,
        actor: &str,
    ) -> Result<FirstPage, FetchError>;

    /// Fetch one content page
    async fn fetch_page(&self, page_url: &str, actor: &str) -> Result<CatalogPage, FetchError>;
}

const USER_AGENT: &str = concat!("cadenza-ingest/", env!("CARGO_PKG_VERSION"));

/// Actor identity header presented to the remote peer
const ACTOR_HEADER: &str = "X-Catalog-Actor";

/// HTTP catalog client
pub struct HttpCatalog {
    http_client: Client,
}

impl HttpCatalog {
    pub fn new(timeout: Duration) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        Self {
            http_client: Client::builder()
                .timeout(timeout)
                .default_headers(headers)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    async fn get_json(&self, url: &str, actor: &str) -> Result<Value, FetchError> {
        let response = self
            .http_client
            .get(url)
            .header(ACTOR_HEADER, actor)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    FetchError::Transient(format!("{}: {}", url, e))
                } else {
                    FetchError::Permanent(format!("{}: {}", url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("{} returned {}", url, status);
            // Server-side and throttling statuses are worth retrying
            return if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(FetchError::Transient(message))
            } else {
                Err(FetchError::Permanent(message))
            };
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Permanent(format!("Unparseable response from {}: {}", url, e)))?;

        // An application-level error payload is final even behind a 200
        if body.get("errors").is_some() {
            return Err(FetchError::Permanent(format!(
                "Error payload from {}: {}",
                url, body
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl RemoteCatalog for HttpCatalog {
    async fn fetch_first_page(
        &self,
        catalog_url: &str,
        actor: &str,
    ) -> Result<FirstPage, FetchError> {
        let body = self.get_json(catalog_url, actor).await?;

        let total_items = body
            .get("totalItems")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                FetchError::Permanent(format!("Catalog {} reports no totalItems", catalog_url))
            })?;
        let first_page_url = body
            .get("first")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                FetchError::Permanent(format!("Catalog {} declares no first page", catalog_url))
            })?
            .to_string();

        Ok(FirstPage { total_items, first_page_url })
    }

    async fn fetch_page(&self, page_url: &str, actor: &str) -> Result<CatalogPage, FetchError> {
        let body = self.get_json(page_url, actor).await?;

        let items = body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let next_page_url = body
            .get("next")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(CatalogPage { items, next_page_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Transient("connection refused".to_string());
        assert!(err.to_string().contains("Transient"));
        let err = FetchError::Permanent("410 Gone".to_string());
        assert!(err.to_string().contains("Permanent"));
    }
}
