use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, GaugeVec};
use tracing::{info, warn};

use crate::db::{self, store::NotificationStore, store::PgStore};

lazy_static! {
    // ── Event counters ──────────────────────────────────────────────────────
    pub static ref SCHEDULED_COUNTER: CounterVec = register_counter_vec!(
        "notifications_scheduled_total",
        "Scheduling attempts per studio, template type and outcome",
        &["tenant", "template_type", "outcome"]
    ).unwrap();

    pub static ref DELIVERED_COUNTER: CounterVec = register_counter_vec!(
        "notifications_delivered_total",
        "Delivery attempts per studio and final status",
        &["tenant", "status"]
    ).unwrap();

    pub static ref SWEEPS_COUNTER: CounterVec = register_counter_vec!(
        "notification_sweeps_total",
        "Delivery sweeps per studio and result",
        &["tenant", "result"]
    ).unwrap();

    // ── Queue state ─────────────────────────────────────────────────────────
    pub static ref QUEUE_GAUGE: GaugeVec = register_gauge_vec!(
        "notifications_queue_rows",
        "Scheduled notification rows per studio and status",
        &["tenant", "status"]
    ).unwrap();
}

/// Spawn the background collector for queue gauges (refreshes every 5 minutes).
pub fn start(store: PgStore) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = collect(&store).await {
                warn!("Metrics: collection failed: {}", e);
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
        }
    });
}

async fn collect(store: &PgStore) -> anyhow::Result<()> {
    let studios = db::active_studios(&store.pool).await?;

    for slug in &studios {
        match store.count_by_status(slug).await {
            Ok(counts) => {
                for (status, count) in counts {
                    QUEUE_GAUGE.with_label_values(&[slug, &status]).set(count as f64);
                }
            }
            Err(e) => warn!("Metrics: cannot count notifications for '{}': {}", slug, e),
        }
    }

    info!("Metrics: collected for {} studio(s)", studios.len());
    Ok(())
}
