//! Scan job persistence
//!
//! State and progress for remote catalog crawls. Jobs are observable by
//! operators through `{status, total_items, processed_items}` and retain
//! the last error for terminal `errored` jobs.

use cadenza_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_timestamp;
use crate::models::{ScanJob, ScanStatus};

/// Save scan job (insert or update)
pub async fn save_scan_job(pool: &SqlitePool, job: &ScanJob) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scan_jobs (
            job_id, status, catalog_url, actor, total_items, processed_items,
            errored_items, last_error, cancel_requested, created_at, modified_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(job_id) DO UPDATE SET
            status = excluded.status,
            total_items = excluded.total_items,
            processed_items = excluded.processed_items,
            errored_items = excluded.errored_items,
            last_error = excluded.last_error,
            cancel_requested = excluded.cancel_requested,
            modified_at = excluded.modified_at
        "#,
    )
    .bind(job.job_id.to_string())
    .bind(job.status.as_str())
    .bind(&job.catalog_url)
    .bind(&job.actor)
    .bind(job.total_items)
    .bind(job.processed_items)
    .bind(job.errored_items)
    .bind(&job.last_error)
    .bind(job.cancel_requested as i64)
    .bind(job.created_at.to_rfc3339())
    .bind(job.modified_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load scan job by id
pub async fn load_scan_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<ScanJob>> {
    let row = sqlx::query("SELECT * FROM scan_jobs WHERE job_id = ?")
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let job_id_str: String = row.get("job_id");
            let status_str: String = row.get("status");
            let created_at: String = row.get("created_at");
            let modified_at: String = row.get("modified_at");
            let cancel_requested: i64 = row.get("cancel_requested");

            Ok(Some(ScanJob {
                job_id: Uuid::parse_str(&job_id_str)
                    .map_err(|e| Error::Internal(format!("Bad job_id: {}", e)))?,
                status: ScanStatus::parse(&status_str)
                    .ok_or_else(|| Error::Internal(format!("Bad scan status '{}'", status_str)))?,
                catalog_url: row.get("catalog_url"),
                actor: row.get("actor"),
                total_items: row.get("total_items"),
                processed_items: row.get("processed_items"),
                errored_items: row.get("errored_items"),
                last_error: row.get("last_error"),
                cancel_requested: cancel_requested != 0,
                created_at: parse_timestamp(&created_at)?,
                modified_at: parse_timestamp(&modified_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Request cancellation of a running scan.
///
/// The pipeline honors this between page steps; no in-flight step is
/// interrupted.
pub async fn request_cancel(pool: &SqlitePool, job_id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE scan_jobs SET cancel_requested = 1, modified_at = ? WHERE job_id = ?",
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(job_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
