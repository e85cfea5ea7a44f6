use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::db;
use crate::services::delivery::{DeliveryWorker, SweepError};

/// Spawn a background task that runs one delivery sweep per active studio
/// every `interval`. Overlaps with the HTTP trigger are refused by the lease.
pub fn start(pool: PgPool, worker: Arc<DeliveryWorker>, interval: Duration) {
    tokio::spawn(async move {
        info!("Delivery scheduler: sweeping every {}s", interval.as_secs());
        loop {
            tokio::time::sleep(interval).await;

            let studios = match db::active_studios(&pool).await {
                Ok(slugs) => slugs,
                Err(e) => {
                    warn!("Delivery scheduler: failed to query studios: {}", e);
                    continue;
                }
            };

            for slug in studios {
                match worker.process_due(&slug, worker.batch_size()).await {
                    Ok(report) if report.processed > 0 || report.skipped > 0 => info!(
                        "Delivery scheduler: '{}' sent {} / failed {} / skipped {}",
                        slug, report.sent, report.failed, report.skipped
                    ),
                    Ok(_) => {}
                    Err(SweepError::AlreadyRunning) => {
                        debug!("Delivery scheduler: '{}' busy, skipping", slug)
                    }
                    Err(SweepError::NoActiveGateway) => {
                        debug!("Delivery scheduler: '{}' has no gateway", slug)
                    }
                    Err(e) => warn!("Delivery scheduler: sweep error for '{}': {}", slug, e),
                }
            }
        }
    });
}
