pub mod appointments;
pub mod gateways;
#[cfg(test)]
pub mod memory;
pub mod notifications;
pub mod store;
pub mod templates;
pub mod tenant;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the public-schema migrations embedded in ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Slugs of every studio that is currently active.
pub async fn active_studios(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    let slugs = sqlx::query_scalar("SELECT slug FROM public.studios WHERE is_active = TRUE ORDER BY slug")
        .fetch_all(pool)
        .await?;
    Ok(slugs)
}

/// Re-provision all active tenant schemas (idempotent, run on every startup).
pub async fn migrate_all_existing_tenants(pool: &PgPool) -> anyhow::Result<()> {
    for slug in active_studios(pool).await? {
        tenant::provision_tenant_schema(pool, &slug).await?;
        tracing::info!("Migrated tenant schema: {}", tenant::schema_name(&slug));
    }
    Ok(())
}
