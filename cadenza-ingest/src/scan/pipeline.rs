//! Remote catalog scan pipeline
//!
//! Drives one ScanJob through its lifecycle: open the catalog, walk its
//! pages in cursor order, and feed every item through the normalizer and
//! resolver. A page step is idempotent per `(job, page_url)` because
//! resolution is idempotent by identifier, so re-running a step after a
//! crash is safe. Page steps for the same job never run out of order;
//! the sequential `run` loop schedules page N+1 only after page N
//! completes.

use cadenza_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::{CatalogPage, FetchError, RemoteCatalog};
use crate::db::scan_jobs::{load_scan_job, save_scan_job};
use crate::models::{ForcedValues, ScanJob, ScanStatus};
use crate::normalizer::federation;
use crate::resolver::Resolver;

/// Retry policy for page fetches.
///
/// Only transient failures are retried; a permanent failure (the remote
/// answered with an error) terminates the job immediately.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl From<&cadenza_common::config::ScanSettings> for ScanPolicy {
    fn from(settings: &cadenza_common::config::ScanSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }
}

/// Scan pipeline over one candidate store and one remote catalog client
pub struct ScanPipeline {
    db: SqlitePool,
    catalog: Arc<dyn RemoteCatalog>,
    resolver: Resolver,
    policy: ScanPolicy,
}

impl ScanPipeline {
    pub fn new(db: SqlitePool, catalog: Arc<dyn RemoteCatalog>, policy: ScanPolicy) -> Self {
        let resolver = Resolver::new(db.clone());
        Self { db, catalog, resolver, policy }
    }

    /// Create and persist a new pending job for a catalog
    pub async fn create_job(&self, catalog_url: &str, actor: &str) -> Result<ScanJob> {
        let job = ScanJob::new(catalog_url.to_string(), actor.to_string());
        save_scan_job(&self.db, &job).await?;
        Ok(job)
    }

    /// Open the catalog: pending → scanning, recording the reported size.
    ///
    /// Any fetch failure here is fatal for the job (no retry); a fresh
    /// job is required to try the catalog again. Returns the first page
    /// URL.
    pub async fn start(&self, job_id: Uuid) -> Result<String> {
        let mut job = self.load_job(job_id).await?;
        if job.status != ScanStatus::Pending {
            return Err(Error::InvalidInput(format!(
                "Scan job {} is {}, expected pending",
                job_id,
                job.status.as_str()
            )));
        }

        match self
            .catalog
            .fetch_first_page(&job.catalog_url, &job.actor)
            .await
        {
            Ok(first) => {
                job.total_items = first.total_items;
                job.transition_to(ScanStatus::Scanning);
                save_scan_job(&self.db, &job).await?;
                info!(
                    job_id = %job_id,
                    total_items = first.total_items,
                    "Scan started"
                );
                Ok(first.first_page_url)
            }
            Err(err) => {
                self.fail_job(&mut job, &err.to_string()).await?;
                Err(Error::Internal(format!(
                    "Scan job {} failed to open catalog: {}",
                    job_id, err
                )))
            }
        }
    }

    /// One page step: fetch the page at the cursor, resolve its items,
    /// advance progress, and return the next cursor if there is one.
    ///
    /// A job no longer in `scanning` (finished, errored or canceled
    /// elsewhere) makes this a no-op.
    pub async fn scan_page(&self, job_id: Uuid, page_url: &str) -> Result<Option<String>> {
        let mut job = self.load_job(job_id).await?;
        if job.status != ScanStatus::Scanning {
            warn!(
                job_id = %job_id,
                status = job.status.as_str(),
                "Skipping page step for non-scanning job"
            );
            return Ok(None);
        }

        let page = match self.fetch_page_with_retry(page_url, &job.actor).await {
            Ok(page) => page,
            Err(err) => {
                self.fail_job(&mut job, &err.to_string()).await?;
                return Err(Error::Internal(format!(
                    "Scan job {} failed on page {}: {}",
                    job_id, page_url, err
                )));
            }
        };

        let item_count = page.items.len() as i64;
        let mut errored = 0i64;
        for (index, item) in page.items.iter().enumerate() {
            if let Err(err) = self.resolve_item(item).await {
                // One bad item never aborts the page
                warn!(
                    job_id = %job_id,
                    page_url,
                    item_index = index,
                    error = %err,
                    "Item failed to resolve"
                );
                errored += 1;
            }
        }

        // "Attempted" semantics: the counter advances by the full page,
        // including items that failed individually
        job.processed_items += item_count;
        job.errored_items += errored;

        let next = page
            .next_page_url
            .filter(|next| next != page_url);

        if next.is_none() {
            job.transition_to(ScanStatus::Finished);
            info!(
                job_id = %job_id,
                processed_items = job.processed_items,
                errored_items = job.errored_items,
                "Scan finished"
            );
        } else {
            job.modified_at = chrono::Utc::now();
        }
        save_scan_job(&self.db, &job).await?;

        debug!(
            job_id = %job_id,
            page_url,
            items = item_count,
            errored,
            "Page step complete"
        );
        Ok(next)
    }

    /// Drive a pending job to a terminal state, honoring cancellation
    /// between page steps.
    pub async fn run(&self, job_id: Uuid) -> Result<()> {
        let mut cursor = self.start(job_id).await?;

        loop {
            if self.cancel_requested(job_id).await? {
                self.cancel_job(job_id).await?;
                return Ok(());
            }
            match self.scan_page(job_id, &cursor).await? {
                Some(next) => cursor = next,
                None => return Ok(()),
            }
        }
    }

    async fn load_job(&self, job_id: Uuid) -> Result<ScanJob> {
        load_scan_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Scan job {}", job_id)))
    }

    async fn cancel_requested(&self, job_id: Uuid) -> Result<bool> {
        Ok(self.load_job(job_id).await?.cancel_requested)
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<()> {
        let mut job = self.load_job(job_id).await?;
        if job.transition_to(ScanStatus::Canceled) {
            save_scan_job(&self.db, &job).await?;
            info!(job_id = %job_id, "Scan canceled");
        }
        Ok(())
    }

    async fn fail_job(&self, job: &mut ScanJob, error: &str) -> Result<()> {
        job.last_error = Some(error.to_string());
        job.transition_to(ScanStatus::Errored);
        save_scan_job(&self.db, job).await
    }

    /// Fetch one page, retrying transient failures with exponential
    /// backoff up to the policy's attempt budget.
    async fn fetch_page_with_retry(
        &self,
        page_url: &str,
        actor: &str,
    ) -> std::result::Result<CatalogPage, FetchError> {
        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.catalog.fetch_page(page_url, actor).await {
                Ok(page) => return Ok(page),
                Err(FetchError::Permanent(message)) => {
                    return Err(FetchError::Permanent(message));
                }
                Err(FetchError::Transient(message)) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(FetchError::Transient(format!(
                            "{} (after {} attempts)",
                            message, attempt
                        )));
                    }
                    warn!(
                        page_url,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %message,
                        "Transient page fetch failure, will retry"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.policy.max_backoff);
                }
            }
        }
    }

    async fn resolve_item(&self, item: &serde_json::Value) -> Result<()> {
        let record = federation::track_record(item)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let resolution = self
            .resolver
            .resolve_track(&record, &ForcedValues::default(), None)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        for created in resolution.created_refs() {
            debug!(entity = ?created, "Created entity during scan");
        }
        Ok(())
    }
}
