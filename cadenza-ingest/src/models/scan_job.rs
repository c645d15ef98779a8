//! Remote catalog scan state machine
//!
//! One ScanJob represents one crawl of a remote catalog:
//! PENDING → SCANNING → FINISHED, with ERRORED and CANCELED as the other
//! terminal states. No transition leaves a terminal state; retrying a
//! catalog means creating a fresh job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scan job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Created, first page not yet fetched
    Pending,
    /// First page fetched, total item count known
    Scanning,
    /// All pages processed
    Finished,
    /// Unrecoverable fetch failure (or retry budget exhausted)
    Errored,
    /// Cancellation requested and honored between page steps
    Canceled,
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Finished | ScanStatus::Errored | ScanStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Finished => "finished",
            ScanStatus::Errored => "errored",
            ScanStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ScanStatus::Pending),
            "scanning" => Some(ScanStatus::Scanning),
            "finished" => Some(ScanStatus::Finished),
            "errored" => Some(ScanStatus::Errored),
            "canceled" => Some(ScanStatus::Canceled),
            _ => None,
        }
    }
}

/// One crawl of a remote catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    /// Unique job identifier
    pub job_id: Uuid,

    /// Current status
    pub status: ScanStatus,

    /// Address of the remote catalog being crawled
    pub catalog_url: String,

    /// Crawling identity presented to the remote peer
    pub actor: String,

    /// Item count reported by the catalog (known once scanning)
    pub total_items: i64,

    /// Items attempted so far (advances per page regardless of per-item
    /// success)
    pub processed_items: i64,

    /// Items whose normalization/resolution failed (isolated, counted,
    /// never aborting the page)
    pub errored_items: i64,

    /// Last error class/message, retained for operator inspection
    pub last_error: Option<String>,

    /// Cooperative cancellation flag, checked between page steps.
    /// An explicit per-job field rather than ambient process state, so
    /// concurrent scans and test runs do not interfere.
    pub cancel_requested: bool,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ScanJob {
    /// Create a new pending scan job for a catalog
    pub fn new(catalog_url: String, actor: String) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            status: ScanStatus::Pending,
            catalog_url,
            actor,
            total_items: 0,
            processed_items: 0,
            errored_items: 0,
            last_error: None,
            cancel_requested: false,
            created_at: now,
            modified_at: now,
        }
    }

    /// Transition to a new status, refusing to leave terminal states
    pub fn transition_to(&mut self, new_status: ScanStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = new_status;
        self.modified_at = Utc::now();
        true
    }
}
