pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use config::Config;
use db::store::PgStore;
use services::{
    dedup::DeduplicationGuard,
    delivery::{DeliverySettings, DeliveryWorker},
    gateway::GatewayResolver,
    scheduler::NotificationScheduler,
    sweep_lock::SweepLease,
    templates::TemplateRenderer,
    whatsapp::WhatsAppClient,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: redis::aio::MultiplexedConnection,
    pub config: Arc<Config>,
    pub store: Arc<PgStore>,
    pub scheduler: Arc<NotificationScheduler>,
    pub worker: Arc<DeliveryWorker>,
}

/// The notification components wired to Postgres and the WhatsApp gateway.
/// Shared by the API server and the command-line tools.
pub struct Services {
    pub store: Arc<PgStore>,
    pub scheduler: Arc<NotificationScheduler>,
    pub worker: Arc<DeliveryWorker>,
}

impl Services {
    pub fn build(pool: PgPool, config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(PgStore::new(pool));
        let renderer = TemplateRenderer::new(store.clone());

        let dedup = DeduplicationGuard::new(store.clone(), chrono::Duration::seconds(config.dedup_window_secs));
        let scheduler = Arc::new(NotificationScheduler::new(store.clone(), renderer.clone(), dedup));

        let gateway = Arc::new(WhatsAppClient::new(Duration::from_secs(config.gateway_timeout_secs))?);
        let worker = Arc::new(DeliveryWorker::new(
            store.clone(),
            renderer,
            GatewayResolver::new(store.clone()),
            gateway,
            SweepLease::new(Duration::from_secs(config.sweep_lease_secs)),
            DeliverySettings {
                batch_size: config.delivery_batch_size,
                throttle: Duration::from_millis(config.delivery_throttle_ms),
                country_code: config.default_country_code.clone(),
                stale_after: chrono::Duration::seconds(config.stale_processing_secs),
            },
        ));

        Ok(Self { store, scheduler, worker })
    }
}
