use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::store::{NotificationStore, PgStore};
use super::tenant::schema_name;
use crate::models::notification::{NewNotification, NotificationFilter, ScheduledNotification};

const COLUMNS: &str = "id, business_event_id, template_type, recipient_phone, recipient_name,
                       rendered_message, variables, scheduled_for, status, sent_at,
                       error_message, created_at, updated_at";

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert(&self, tenant: &str, new: NewNotification) -> anyhow::Result<ScheduledNotification> {
        let schema = schema_name(tenant);
        let row = sqlx::query_as::<_, ScheduledNotification>(&format!(
            r#"INSERT INTO "{schema}".scheduled_notifications
                   (business_event_id, template_type, recipient_phone, recipient_name,
                    rendered_message, variables, scheduled_for, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
               RETURNING {COLUMNS}"#
        ))
        .bind(new.business_event_id)
        .bind(&new.template_type)
        .bind(&new.recipient_phone)
        .bind(&new.recipient_name)
        .bind(&new.rendered_message)
        .bind(Json(&new.variables))
        .bind(new.scheduled_for)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, tenant: &str, id: Uuid) -> anyhow::Result<Option<ScheduledNotification>> {
        let schema = schema_name(tenant);
        let row = sqlx::query_as::<_, ScheduledNotification>(&format!(
            r#"SELECT {COLUMNS} FROM "{schema}".scheduled_notifications WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn has_blocking(
        &self,
        tenant: &str,
        event_id: Uuid,
        template_type: &str,
        sent_since: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let schema = schema_name(tenant);
        let exists: bool = sqlx::query_scalar(&format!(
            r#"SELECT EXISTS (
                   SELECT 1 FROM "{schema}".scheduled_notifications
                   WHERE business_event_id = $1
                     AND template_type = $2
                     AND (status = 'pending' OR (status = 'sent' AND sent_at >= $3))
               )"#
        ))
        .bind(event_id)
        .bind(template_type)
        .bind(sent_since)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn due(&self, tenant: &str, now: DateTime<Utc>, limit: i64) -> anyhow::Result<Vec<ScheduledNotification>> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, ScheduledNotification>(&format!(
            r#"SELECT {COLUMNS} FROM "{schema}".scheduled_notifications
               WHERE status = 'pending' AND scheduled_for <= $1
               ORDER BY scheduled_for ASC
               LIMIT $2"#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn claim(&self, tenant: &str, id: Uuid) -> anyhow::Result<bool> {
        let schema = schema_name(tenant);
        let res = sqlx::query(&format!(
            r#"UPDATE "{schema}".scheduled_notifications
               SET status = 'processing'
               WHERE id = $1 AND status = 'pending'"#
        ))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn mark_sent(&self, tenant: &str, id: Uuid, sent_at: DateTime<Utc>) -> anyhow::Result<()> {
        let schema = schema_name(tenant);
        sqlx::query(&format!(
            r#"UPDATE "{schema}".scheduled_notifications
               SET status = 'sent', sent_at = $2, error_message = NULL
               WHERE id = $1 AND status = 'processing'"#
        ))
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, tenant: &str, id: Uuid, error: &str) -> anyhow::Result<()> {
        let schema = schema_name(tenant);
        sqlx::query(&format!(
            r#"UPDATE "{schema}".scheduled_notifications
               SET status = 'failed', error_message = $2
               WHERE id = $1 AND status = 'processing'"#
        ))
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cancel_pending(&self, tenant: &str, event_id: Uuid) -> anyhow::Result<u64> {
        let schema = schema_name(tenant);
        let res = sqlx::query(&format!(
            r#"UPDATE "{schema}".scheduled_notifications
               SET status = 'cancelled'
               WHERE business_event_id = $1 AND status = 'pending'"#
        ))
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn list(&self, tenant: &str, filter: &NotificationFilter) -> anyhow::Result<Vec<ScheduledNotification>> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, ScheduledNotification>(&format!(
            r#"SELECT {COLUMNS} FROM "{schema}".scheduled_notifications
               WHERE ($1::TEXT IS NULL OR status = $1)
                 AND ($2::UUID IS NULL OR business_event_id = $2)
               ORDER BY created_at DESC
               LIMIT $3 OFFSET $4"#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.event_id)
        .bind(filter.per_page())
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_by_status(&self, tenant: &str) -> anyhow::Result<Vec<(String, i64)>> {
        let schema = schema_name(tenant);
        let counts = sqlx::query_as(&format!(
            r#"SELECT status, COUNT(*)::BIGINT FROM "{schema}".scheduled_notifications
               GROUP BY status ORDER BY status"#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn purge_terminal(&self, tenant: &str, before: DateTime<Utc>) -> anyhow::Result<u64> {
        let schema = schema_name(tenant);
        let res = sqlx::query(&format!(
            r#"DELETE FROM "{schema}".scheduled_notifications
               WHERE status IN ('sent', 'failed', 'cancelled')
                 AND COALESCE(sent_at, updated_at) < $1"#
        ))
        .bind(before)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn fail_stale(&self, tenant: &str, before: DateTime<Utc>, error: &str) -> anyhow::Result<u64> {
        let schema = schema_name(tenant);
        let res = sqlx::query(&format!(
            r#"UPDATE "{schema}".scheduled_notifications
               SET status = 'failed', error_message = $2
               WHERE status = 'processing' AND updated_at < $1"#
        ))
        .bind(before)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}
