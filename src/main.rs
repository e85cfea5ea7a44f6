use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use redis::Client as RedisClient;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shutterbook_notify::{
    config::Config,
    db,
    middleware::auth::JwtSecret,
    routes,
    services::{delivery_scheduler, metrics},
    AppState, Services,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    db::migrate_all_existing_tenants(&pool).await?;
    info!("Database connected and migrations applied");

    let redis_client = RedisClient::open(config.redis_url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_async_connection().await?;
    info!("Redis connected");

    let services = Services::build(pool.clone(), &config)?;

    if config.delivery_interval_secs > 0 {
        delivery_scheduler::start(
            pool.clone(),
            services.worker.clone(),
            Duration::from_secs(config.delivery_interval_secs),
        );
    } else {
        info!("DELIVERY_INTERVAL_SECS=0, relying on the HTTP trigger only");
    }
    metrics::start((*services.store).clone());

    let state = AppState {
        db: pool,
        redis: redis_conn,
        config: config.clone(),
        store: services.store,
        scheduler: services.scheduler,
        worker: services.worker,
    };

    // Allow the app base domain and its studio subdomains; localhost in development.
    let base = config.app_base_url.clone();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        if o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base {
            return true;
        }
        match base.find("://") {
            Some(idx) => {
                let after_scheme = &base[idx + 3..];
                let domain = after_scheme.split('/').next().unwrap_or(after_scheme);
                let domain = domain.split(':').next().unwrap_or(domain);
                o.ends_with(&format!(".{domain}"))
            }
            None => false,
        }
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-tenant"),
        ]))
        .allow_origin(cors_origin);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Delivery trigger (external cron)
        .route("/send-scheduled-notifications", post(routes::notifications::send_scheduled_notifications))
        // Business events
        .route("/events/appointment-created", post(routes::events::appointment_created))
        .route("/events/appointment-cancelled", post(routes::events::appointment_cancelled))
        .route("/events/gallery-ready", post(routes::events::gallery_ready))
        .route("/events/selection-submitted", post(routes::events::selection_submitted))
        .route("/events/payment-approved", post(routes::events::payment_approved))
        // Notification log
        .route("/notifications", get(routes::notifications::list_notifications))
        .route("/notifications/summary", get(routes::notifications::summary))
        .route("/notifications/{id}/resend", post(routes::notifications::resend))
        // Templates
        .route("/notification-templates", get(routes::templates::list_templates))
        .route("/notification-templates/{type}", put(routes::templates::upsert_template))
        .route("/notification-templates/{type}/preview", post(routes::templates::preview_template))
        .layer(axum::Extension(JwtSecret(config.jwt_secret.clone())))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("shutterbook notifications API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
