/// Delete finished notifications (sent, failed, cancelled) past retention.
/// Run daily (e.g., via cron job: 0 3 * * * /app/purge-notifications)
///
/// Usage: purge-notifications [--tenant SLUG] [--days N]
use std::sync::Arc;

use clap::Parser;

use shutterbook_notify::{
    config::Config, db, db::store::PgStore, middleware::tenant::is_valid_slug,
    services::retention::RetentionService,
};

#[derive(Parser)]
#[command(name = "purge-notifications", about = "Purge old notification rows")]
struct Args {
    /// Studio slug (all active studios if not specified)
    #[arg(long)]
    tenant: Option<String>,

    /// Retention in days, at least 1 (RETENTION_DAYS by default)
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    days: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let retention = RetentionService::new(
        Arc::new(PgStore::new(pool.clone())),
        args.days.unwrap_or(config.retention_days),
        config.dedup_window_secs,
    )?;

    let studios = match args.tenant {
        Some(slug) if is_valid_slug(&slug) => vec![slug],
        Some(slug) => anyhow::bail!("invalid studio slug '{slug}'"),
        None => db::active_studios(&pool).await?,
    };
    tracing::info!("Purging notifications for {} studio(s)", studios.len());

    for slug in studios {
        if let Err(e) = retention.purge(&slug).await {
            tracing::error!("Error purging studio {}: {}", slug, e);
        }
    }

    tracing::info!("Notification purge completed");
    Ok(())
}
