//! cadenza-ingest - Catalog Ingest Service
//!
//! Crawls a remote peer's catalog and reconciles every track it
//! describes into the local metadata store.
//!
//! Usage: cadenza-ingest <catalog-url> <actor> [database-path]

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cadenza_common::config::IngestConfig;
use cadenza_ingest::scan::HttpCatalog;
use cadenza_ingest::{ScanPipeline, ScanPolicy};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting cadenza-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let catalog_url = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Usage: cadenza-ingest <catalog-url> <actor> [database-path]"))?;
    let actor = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Usage: cadenza-ingest <catalog-url> <actor> [database-path]"))?;
    let db_arg = args.next();

    let config = IngestConfig::load(None)?;
    let db_path = config.resolve_database_path(db_arg.as_deref());
    info!("Database: {}", db_path.display());

    let db_pool = cadenza_ingest::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let catalog = Arc::new(HttpCatalog::new(Duration::from_secs(
        config.catalog.timeout_secs,
    )));
    let pipeline = ScanPipeline::new(db_pool, catalog, ScanPolicy::from(&config.scan));

    let job = pipeline.create_job(&catalog_url, &actor).await?;
    info!("Scan job {} created for {}", job.job_id, catalog_url);

    pipeline.run(job.job_id).await?;

    Ok(())
}
