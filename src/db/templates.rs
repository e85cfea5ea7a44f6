use async_trait::async_trait;

use super::store::{PgStore, TemplateStore};
use super::tenant::schema_name;
use crate::models::template::NotificationTemplate;

#[async_trait]
impl TemplateStore for PgStore {
    async fn active_template(&self, tenant: &str, template_type: &str) -> anyhow::Result<Option<NotificationTemplate>> {
        let schema = schema_name(tenant);
        let row = sqlx::query_as::<_, NotificationTemplate>(&format!(
            r#"SELECT id, type, message_template, is_active, updated_at
               FROM "{schema}".notification_templates
               WHERE type = $1 AND is_active = TRUE"#
        ))
        .bind(template_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_templates(&self, tenant: &str) -> anyhow::Result<Vec<NotificationTemplate>> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, NotificationTemplate>(&format!(
            r#"SELECT id, type, message_template, is_active, updated_at
               FROM "{schema}".notification_templates
               ORDER BY type"#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_template(
        &self,
        tenant: &str,
        template_type: &str,
        message_template: &str,
        is_active: bool,
    ) -> anyhow::Result<NotificationTemplate> {
        let schema = schema_name(tenant);
        let row = sqlx::query_as::<_, NotificationTemplate>(&format!(
            r#"INSERT INTO "{schema}".notification_templates (type, message_template, is_active)
               VALUES ($1, $2, $3)
               ON CONFLICT (type) DO UPDATE
                 SET message_template = EXCLUDED.message_template,
                     is_active        = EXCLUDED.is_active
               RETURNING id, type, message_template, is_active, updated_at"#
        ))
        .bind(template_type)
        .bind(message_template)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
