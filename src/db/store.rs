//! Storage seams used by the scheduling and delivery services.
//!
//! Every method takes the studio slug; implementations scope all reads and
//! writes to that studio. `PgStore` is the production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    gateway::GatewayInstance,
    notification::{NewNotification, NotificationFilter, ScheduledNotification},
    template::NotificationTemplate,
};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, tenant: &str, new: NewNotification) -> anyhow::Result<ScheduledNotification>;

    async fn get(&self, tenant: &str, id: Uuid) -> anyhow::Result<Option<ScheduledNotification>>;

    /// True if a row for `(event_id, template_type)` is `pending`, or `sent`
    /// with `sent_at >= sent_since`.
    async fn has_blocking(
        &self,
        tenant: &str,
        event_id: Uuid,
        template_type: &str,
        sent_since: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    /// Pending rows with `scheduled_for <= now`, earliest first.
    async fn due(&self, tenant: &str, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<ScheduledNotification>>;

    /// `pending -> processing`, guarded by the current status. Returns false
    /// when the row was no longer pending.
    async fn claim(&self, tenant: &str, id: Uuid) -> anyhow::Result<bool>;

    async fn mark_sent(&self, tenant: &str, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<()>;

    async fn mark_failed(&self, tenant: &str, id: Uuid, error: &str) -> anyhow::Result<()>;

    /// `pending -> cancelled` for every row of the event. Returns the number of rows cancelled.
    async fn cancel_pending(&self, tenant: &str, event_id: Uuid) -> anyhow::Result<u64>;

    async fn list(&self, tenant: &str, filter: &NotificationFilter) -> anyhow::Result<Vec<ScheduledNotification>>;

    async fn count_by_status(&self, tenant: &str) -> anyhow::Result<Vec<(String, i64)>>;

    /// Delete `sent`, `failed` and `cancelled` rows that finished before
    /// `before` (`sent_at`, else the last status change).
    async fn purge_terminal(&self, tenant: &str, before: DateTime<Utc>) -> anyhow::Result<u64>;

    /// `processing -> failed` for rows untouched since `before`, left behind
    /// by a sweep that died between claim and delivery. Returns the count.
    async fn fail_stale(&self, tenant: &str, before: DateTime<Utc>, error: &str) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn active_template(&self, tenant: &str, template_type: &str) -> anyhow::Result<Option<NotificationTemplate>>;

    async fn list_templates(&self, tenant: &str) -> anyhow::Result<Vec<NotificationTemplate>>;

    async fn upsert_template(
        &self,
        tenant: &str,
        template_type: &str,
        message_template: &str,
        is_active: bool,
    ) -> anyhow::Result<NotificationTemplate>;
}

#[async_trait]
pub trait GatewayStore: Send + Sync {
    /// All registered instances, oldest first.
    async fn instances(&self, tenant: &str) -> anyhow::Result<Vec<GatewayInstance>>;
}

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
