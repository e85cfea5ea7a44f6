use async_trait::async_trait;

use super::store::{GatewayStore, PgStore};
use super::tenant::schema_name;
use crate::models::gateway::GatewayInstance;

#[async_trait]
impl GatewayStore for PgStore {
    async fn instances(&self, tenant: &str) -> anyhow::Result<Vec<GatewayInstance>> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, GatewayInstance>(&format!(
            r#"SELECT id, instance_name, status, api_url, api_key, created_at
               FROM "{schema}".gateway_instances
               ORDER BY created_at ASC"#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
