//! Retention of the notification log.
//!
//! Rows in a terminal state (`sent`, `failed`, `cancelled`) are hard-deleted
//! once they finished longer ago than the retention period. A row's age runs
//! from `sent_at`, else from its last status change, never from creation:
//! a reminder booked months ahead must survive its own send. Pending and
//! processing rows are never purged, whatever their age.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::db::store::NotificationStore;

pub const DEFAULT_RETENTION_DAYS: i64 = 180;

pub struct RetentionService {
    store: Arc<dyn NotificationStore>,
    retention: Duration,
}

impl RetentionService {
    /// `dedup_window_secs` is a floor: a `sent` row still blocking duplicates
    /// is kept even with a shorter retention.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        retention_days: i64,
        dedup_window_secs: i64,
    ) -> anyhow::Result<Self> {
        if retention_days < 1 {
            anyhow::bail!("retention must be at least 1 day, got {retention_days}");
        }
        let retention = Duration::days(retention_days).max(Duration::seconds(dedup_window_secs));
        Ok(Self { store, retention })
    }

    pub async fn purge(&self, tenant: &str) -> anyhow::Result<u64> {
        self.purge_at(tenant, Utc::now()).await
    }

    pub async fn purge_at(&self, tenant: &str, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let cutoff = now - self.retention;
        let purged = self.store.purge_terminal(tenant, cutoff).await?;
        if purged > 0 {
            info!(
                "Purged {} notification(s) from '{}' (finished more than {} days ago)",
                purged,
                tenant,
                self.retention.num_days()
            );
        }
        Ok(purged)
    }
}
