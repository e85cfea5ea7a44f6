use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::store::NotificationStore;

/// A notification for the same event and template is a duplicate while it
/// is still pending, or during this window after it was sent.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 300;

/// Vetoes scheduling when a logically identical notification already exists.
///
/// The check is not transactional: two schedule calls racing within a few
/// milliseconds can both pass it.
#[derive(Clone)]
pub struct DeduplicationGuard {
    store: Arc<dyn NotificationStore>,
    window: Duration,
}

impl DeduplicationGuard {
    pub fn new(store: Arc<dyn NotificationStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub async fn is_duplicate(&self, tenant: &str, event_id: Uuid, template_type: &str) -> anyhow::Result<bool> {
        self.is_duplicate_at(tenant, event_id, template_type, Utc::now()).await
    }

    pub async fn is_duplicate_at(
        &self,
        tenant: &str,
        event_id: Uuid,
        template_type: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        self.store
            .has_blocking(tenant, event_id, template_type, now - self.window)
            .await
    }
}
