//! Delivery worker: one sweep sends the due notifications of one studio.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::store::NotificationStore;
use crate::models::gateway::GatewayInstance;
use crate::models::notification::ScheduledNotification;
use crate::services::gateway::GatewayResolver;
use crate::services::metrics::{DELIVERED_COUNTER, SWEEPS_COUNTER};
use crate::services::phone::normalize_phone;
use crate::services::sweep_lock::SweepLease;
use crate::services::templates::TemplateRenderer;
use crate::services::whatsapp::MessageGateway;

pub const DEFAULT_BATCH_SIZE: i64 = 10;
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(2);
pub const DEFAULT_STALE_PROCESSING_SECS: i64 = 900;

const INTERRUPTED: &str = "delivery interrupted before the result was recorded";

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub batch_size: i64,
    /// Pause between two consecutive gateway calls of the same sweep.
    pub throttle: Duration,
    pub country_code: String,
    /// A row still `processing` after this long belongs to a dead sweep.
    /// Must exceed the lease TTL plus the gateway timeout.
    pub stale_after: ChronoDuration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            throttle: DEFAULT_THROTTLE,
            country_code: "55".into(),
            stale_after: ChronoDuration::seconds(DEFAULT_STALE_PROCESSING_SECS),
        }
    }
}

/// Per-row result of a sweep. `Skipped` rows were not touched and are
/// still `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Skipped,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub id: Uuid,
    pub template_type: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    /// Rows that reached `sent` or `failed` in this sweep.
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Rows of an earlier, dead sweep moved from `processing` to `failed`.
    pub interrupted: u64,
    pub results: Vec<DeliveryResult>,
}

impl SweepReport {
    fn record(&mut self, result: DeliveryResult) {
        match result.status {
            DeliveryStatus::Sent => {
                self.processed += 1;
                self.sent += 1;
            }
            DeliveryStatus::Failed => {
                self.processed += 1;
                self.failed += 1;
            }
            DeliveryStatus::Skipped => self.skipped += 1,
        }
        self.results.push(result);
    }
}

/// Reasons a whole sweep did not run. Candidate rows stay `pending`.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("no active WhatsApp gateway configured")]
    NoActiveGateway,
    #[error("a sweep is already running for this studio")]
    AlreadyRunning,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SweepError {
    fn as_label(&self) -> &'static str {
        match self {
            SweepError::NoActiveGateway => "no_gateway",
            SweepError::AlreadyRunning => "already_running",
            SweepError::Store(_) => "store_error",
        }
    }
}

pub struct DeliveryWorker {
    store: Arc<dyn NotificationStore>,
    renderer: TemplateRenderer,
    resolver: GatewayResolver,
    gateway: Arc<dyn MessageGateway>,
    lease: SweepLease,
    settings: DeliverySettings,
}

impl DeliveryWorker {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        renderer: TemplateRenderer,
        resolver: GatewayResolver,
        gateway: Arc<dyn MessageGateway>,
        lease: SweepLease,
        settings: DeliverySettings,
    ) -> Self {
        Self { store, renderer, resolver, gateway, lease, settings }
    }

    pub fn batch_size(&self) -> i64 {
        self.settings.batch_size
    }

    /// Run one sweep: send up to `max_batch` due notifications, earliest first.
    pub async fn process_due(&self, tenant: &str, max_batch: i64) -> Result<SweepReport, SweepError> {
        self.process_due_at(tenant, max_batch, Utc::now()).await
    }

    pub async fn process_due_at(
        &self,
        tenant: &str,
        max_batch: i64,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, SweepError> {
        let result = self.sweep(tenant, max_batch, now).await;
        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.as_label(),
        };
        SWEEPS_COUNTER.with_label_values(&[tenant, label]).inc();
        result
    }

    async fn sweep(&self, tenant: &str, max_batch: i64, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        if max_batch < 1 {
            debug!("Delivery: empty batch requested for '{tenant}'");
            return Ok(SweepReport::default());
        }

        let Some(_lease) = self.lease.try_acquire(tenant) else {
            debug!("Delivery: sweep already running for '{tenant}'");
            return Err(SweepError::AlreadyRunning);
        };

        let mut report = SweepReport::default();
        match self.store.fail_stale(tenant, now - self.settings.stale_after, INTERRUPTED).await {
            Ok(0) => {}
            Ok(n) => {
                warn!("Delivery: {n} notification(s) in '{tenant}' were stuck in processing, marked failed");
                report.interrupted = n;
            }
            Err(e) => warn!("Delivery: cannot release stuck notifications in '{tenant}': {e}"),
        }

        let Some(instance) = self.resolver.active_gateway(tenant).await? else {
            warn!("Delivery: no gateway instance configured for '{tenant}', leaving notifications pending");
            return Err(SweepError::NoActiveGateway);
        };

        let due = self.store.due(tenant, now, max_batch).await?;
        let mut attempted_send = false;

        for row in due {
            let (id, template_type) = (row.id, row.template_type.clone());
            let outcome = AssertUnwindSafe(self.deliver_one(tenant, &instance, row, &mut attempted_send))
                .catch_unwind()
                .await;

            let result = match outcome {
                Ok(Some(result)) => result,
                Ok(None) => continue,
                Err(panic) => {
                    let message = format!("unexpected error: {}", panic_message(&panic));
                    error!("Delivery: notification {id} in '{tenant}' aborted: {message}");
                    self.finish(tenant, id, &template_type, Err(message)).await
                }
            };
            report.record(result);
        }

        info!(
            "Delivery: sweep for '{tenant}' processed {} (sent {}, failed {}, skipped {})",
            report.processed, report.sent, report.failed, report.skipped
        );
        Ok(report)
    }

    /// Deliver one row. `None` means another sweep claimed it first.
    /// A storage error on claim leaves the row `pending` for the next sweep.
    async fn deliver_one(
        &self,
        tenant: &str,
        instance: &GatewayInstance,
        row: ScheduledNotification,
        attempted_send: &mut bool,
    ) -> Option<DeliveryResult> {
        match self.store.claim(tenant, row.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Delivery: notification {} already claimed, skipping", row.id);
                return None;
            }
            Err(e) => {
                warn!("Delivery: cannot claim notification {} in '{tenant}': {e}", row.id);
                return Some(DeliveryResult {
                    id: row.id,
                    template_type: row.template_type,
                    status: DeliveryStatus::Skipped,
                    error: Some(e.to_string()),
                });
            }
        }

        let text = match self
            .renderer
            .render(tenant, &row.template_type, &row.variables.0)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Delivery: re-render of {} failed ({e}), using the stored message",
                    row.id
                );
                row.rendered_message.clone()
            }
        };

        let number = match normalize_phone(&row.recipient_phone, &self.settings.country_code) {
            Ok(number) => number,
            Err(e) => {
                warn!("Delivery: notification {} in '{tenant}': {e}", row.id);
                return Some(self.finish(tenant, row.id, &row.template_type, Err(e.to_string())).await);
            }
        };

        if *attempted_send && !self.settings.throttle.is_zero() {
            tokio::time::sleep(self.settings.throttle).await;
        }
        *attempted_send = true;

        let sent = self
            .gateway
            .send_text(instance, &number, &text)
            .await
            .map_err(|e| e.to_string());
        Some(self.finish(tenant, row.id, &row.template_type, sent).await)
    }

    /// Record the terminal state of a processed row.
    async fn finish(
        &self,
        tenant: &str,
        id: Uuid,
        template_type: &str,
        outcome: Result<(), String>,
    ) -> DeliveryResult {
        let (status, error, stored) = match outcome {
            Ok(()) => {
                let stored = self.store.mark_sent(tenant, id, Utc::now()).await;
                (DeliveryStatus::Sent, None, stored)
            }
            Err(message) => {
                let stored = self.store.mark_failed(tenant, id, &message).await;
                (DeliveryStatus::Failed, Some(message), stored)
            }
        };

        if let Err(e) = stored {
            error!("Delivery: cannot record {} for notification {id} in '{tenant}': {e}", status.as_str());
        }
        match &error {
            None => info!("Delivery: '{template_type}' {id} sent"),
            Some(message) => warn!("Delivery: '{template_type}' {id} failed: {message}"),
        }
        DELIVERED_COUNTER
            .with_label_values(&[tenant, status.as_str()])
            .inc();

        DeliveryResult { id, template_type: template_type.to_string(), status, error }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
