//! Turns business events into pending notification rows.
//!
//! Every entry point here is best-effort: failures are logged and reported
//! as a [`ScheduleOutcome`], never propagated to the booking, upload or
//! selection flow that triggered them.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::store::NotificationStore;
use crate::models::{
    appointment::Appointment,
    notification::{template_types, NewNotification, NotificationStatus, TemplateVars},
};
use crate::services::dedup::DeduplicationGuard;
use crate::services::metrics::SCHEDULED_COUNTER;
use crate::services::templates::TemplateRenderer;

const SELECTION_REMINDER_DELAY_DAYS: i64 = 6;

/// When a notification becomes eligible for delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Due at scheduling time; never skipped.
    Immediate,
    /// Due at the given instant; skipped if that instant has already passed.
    At(DateTime<Utc>),
}

#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub event_id: Uuid,
    pub template_type: String,
    pub recipient_phone: String,
    pub recipient_name: String,
    pub trigger: Trigger,
    pub variables: TemplateVars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOutcome {
    Scheduled,
    /// An equivalent notification is already pending or was just sent.
    Duplicate,
    SkippedPast,
    Invalid,
    Failed,
}

impl ScheduleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleOutcome::Scheduled => "scheduled",
            ScheduleOutcome::Duplicate => "duplicate",
            ScheduleOutcome::SkippedPast => "skipped_past",
            ScheduleOutcome::Invalid => "invalid",
            ScheduleOutcome::Failed => "failed",
        }
    }

    /// A duplicate counts as success: the notification is already scheduled.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ScheduleOutcome::Scheduled | ScheduleOutcome::Duplicate | ScheduleOutcome::SkippedPast
        )
    }
}

/// Outcome of one rule derived from a business event.
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub template_type: &'static str,
    pub outcome: ScheduleOutcome,
}

#[derive(Debug, Clone)]
pub struct GalleryReady {
    pub gallery_link: String,
    pub photo_count: i64,
    pub previous_photo_count: i64,
    pub min_photos: i64,
}

impl GalleryReady {
    /// True only on the upload that takes the gallery over the threshold.
    pub fn crosses_threshold(&self) -> bool {
        self.previous_photo_count < self.min_photos && self.photo_count >= self.min_photos
    }
}

#[derive(Debug, Error)]
pub enum ResendError {
    #[error("notification not found")]
    NotFound,
    #[error("notification is still {0}")]
    StillOpen(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct NotificationScheduler {
    store: Arc<dyn NotificationStore>,
    renderer: TemplateRenderer,
    dedup: DeduplicationGuard,
}

impl NotificationScheduler {
    pub fn new(store: Arc<dyn NotificationStore>, renderer: TemplateRenderer, dedup: DeduplicationGuard) -> Self {
        Self { store, renderer, dedup }
    }

    /// Schedule one notification. Returns false on validation, rendering or
    /// storage failure; a duplicate is reported as success.
    pub async fn schedule_notification(&self, tenant: &str, req: ScheduleRequest) -> bool {
        self.schedule_at(tenant, req, Utc::now()).await.is_success()
    }

    pub async fn schedule_at(&self, tenant: &str, req: ScheduleRequest, now: DateTime<Utc>) -> ScheduleOutcome {
        let outcome = self.try_schedule(tenant, &req, now).await;
        SCHEDULED_COUNTER
            .with_label_values(&[tenant, req.template_type.as_str(), outcome.as_str()])
            .inc();
        outcome
    }

    async fn try_schedule(&self, tenant: &str, req: &ScheduleRequest, now: DateTime<Utc>) -> ScheduleOutcome {
        if req.event_id.is_nil()
            || req.template_type.trim().is_empty()
            || req.recipient_phone.trim().is_empty()
            || req.recipient_name.trim().is_empty()
        {
            warn!(
                "Scheduler: missing required fields for '{}' (event {}) in '{tenant}'",
                req.template_type, req.event_id
            );
            return ScheduleOutcome::Invalid;
        }

        let scheduled_for = match req.trigger {
            Trigger::Immediate => now,
            Trigger::At(at) if at < now => {
                debug!(
                    "Scheduler: '{}' for event {} would trigger in the past ({at}), skipped",
                    req.template_type, req.event_id
                );
                return ScheduleOutcome::SkippedPast;
            }
            Trigger::At(at) => at,
        };

        match self
            .dedup
            .is_duplicate_at(tenant, req.event_id, &req.template_type, now)
            .await
        {
            Ok(true) => {
                info!(
                    "Scheduler: '{}' for event {} already scheduled in '{tenant}'",
                    req.template_type, req.event_id
                );
                return ScheduleOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Scheduler: duplicate check failed in '{tenant}': {e}");
                return ScheduleOutcome::Failed;
            }
        }

        let rendered_message = match self
            .renderer
            .render(tenant, &req.template_type, &req.variables)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Scheduler: cannot render '{}' for event {} in '{tenant}': {e}",
                    req.template_type, req.event_id
                );
                return ScheduleOutcome::Failed;
            }
        };

        let new = NewNotification {
            business_event_id: req.event_id,
            template_type: req.template_type.clone(),
            recipient_phone: req.recipient_phone.clone(),
            recipient_name: req.recipient_name.clone(),
            rendered_message,
            variables: req.variables.clone(),
            scheduled_for,
        };

        match self.store.insert(tenant, new).await {
            Ok(row) => {
                info!(
                    "Scheduler: '{}' {} for event {} due at {}",
                    row.template_type, row.id, row.business_event_id, row.scheduled_for
                );
                ScheduleOutcome::Scheduled
            }
            Err(e) => {
                warn!("Scheduler: insert failed in '{tenant}': {e}");
                ScheduleOutcome::Failed
            }
        }
    }

    async fn apply(
        &self,
        tenant: &str,
        appt: &Appointment,
        template_type: &'static str,
        trigger: Trigger,
        variables: TemplateVars,
        now: DateTime<Utc>,
    ) -> RuleResult {
        let req = ScheduleRequest {
            event_id: appt.id,
            template_type: template_type.to_string(),
            recipient_phone: appt.client_phone.clone(),
            recipient_name: appt.client_name.clone(),
            trigger,
            variables,
        };
        RuleResult { template_type, outcome: self.schedule_at(tenant, req, now).await }
    }

    /// Reminders 24 hours and 2 hours before the session.
    pub async fn on_appointment_created(&self, tenant: &str, appt: &Appointment, now: DateTime<Utc>) -> Vec<RuleResult> {
        let vars = appointment_vars(appt);
        vec![
            self.apply(
                tenant,
                appt,
                template_types::REMINDER_1_DAY_BEFORE,
                Trigger::At(appt.starts_at - Duration::hours(24)),
                vars.clone(),
                now,
            )
            .await,
            self.apply(
                tenant,
                appt,
                template_types::REMINDER_2_HOURS_BEFORE,
                Trigger::At(appt.starts_at - Duration::hours(2)),
                vars,
                now,
            )
            .await,
        ]
    }

    /// Gallery alert now and a selection reminder six days later, once the
    /// photo count crosses the studio's minimum.
    pub async fn on_gallery_ready(
        &self,
        tenant: &str,
        appt: &Appointment,
        gallery: &GalleryReady,
        now: DateTime<Utc>,
    ) -> Vec<RuleResult> {
        if !gallery.crosses_threshold() {
            debug!(
                "Scheduler: gallery of {} at {} photos does not cross the minimum of {}",
                appt.id, gallery.photo_count, gallery.min_photos
            );
            return Vec::new();
        }

        let mut vars = appointment_vars(appt);
        vars.insert("gallery_link".into(), gallery.gallery_link.clone());
        vars.insert("photo_count".into(), gallery.photo_count.to_string());

        vec![
            self.apply(tenant, appt, template_types::GALLERY_READY, Trigger::Immediate, vars.clone(), now)
                .await,
            self.apply(
                tenant,
                appt,
                template_types::SELECTION_REMINDER,
                Trigger::At(now + Duration::days(SELECTION_REMINDER_DELAY_DAYS)),
                vars,
                now,
            )
            .await,
        ]
    }

    /// Selection confirmation, only when the initial payment is approved.
    pub async fn on_selection_submitted(
        &self,
        tenant: &str,
        appt: &Appointment,
        selected_count: i64,
        now: DateTime<Utc>,
    ) -> Vec<RuleResult> {
        if !appt.payment_approved() {
            info!(
                "Scheduler: selection for {} saved without confirmation (payment is '{}')",
                appt.id, appt.payment_status
            );
            return Vec::new();
        }

        let mut vars = appointment_vars(appt);
        vars.insert("selected_count".into(), selected_count.to_string());
        vec![
            self.apply(tenant, appt, template_types::SELECTION_RECEIVED, Trigger::Immediate, vars, now)
                .await,
        ]
    }

    pub async fn on_payment_approved(
        &self,
        tenant: &str,
        appt: &Appointment,
        amount: &str,
        now: DateTime<Utc>,
    ) -> Vec<RuleResult> {
        let mut vars = appointment_vars(appt);
        vars.insert("amount".into(), amount.to_string());
        vec![
            self.apply(tenant, appt, template_types::PAYMENT_RECEIVED, Trigger::Immediate, vars, now)
                .await,
        ]
    }

    /// Cancel every pending notification of an event (e.g. a cancelled appointment).
    pub async fn cancel_for_event(&self, tenant: &str, event_id: Uuid) -> anyhow::Result<u64> {
        let count = self.store.cancel_pending(tenant, event_id).await?;
        if count > 0 {
            info!("Scheduler: cancelled {count} pending notification(s) for event {event_id} in '{tenant}'");
        }
        Ok(count)
    }

    /// Schedule a fresh immediate copy of a finished notification. The old
    /// row is left untouched.
    pub async fn resend(&self, tenant: &str, id: Uuid) -> Result<ScheduleOutcome, ResendError> {
        let row = self.store.get(tenant, id).await?.ok_or(ResendError::NotFound)?;
        match row.status() {
            Some(NotificationStatus::Sent | NotificationStatus::Failed | NotificationStatus::Cancelled) => {}
            _ => return Err(ResendError::StillOpen(row.status.clone())),
        }

        let req = ScheduleRequest {
            event_id: row.business_event_id,
            template_type: row.template_type,
            recipient_phone: row.recipient_phone,
            recipient_name: row.recipient_name,
            trigger: Trigger::Immediate,
            variables: row.variables.0,
        };
        Ok(self.schedule_at(tenant, req, Utc::now()).await)
    }
}

/// Variables every appointment-derived message can use.
pub fn appointment_vars(appt: &Appointment) -> TemplateVars {
    let offset = FixedOffset::east_opt(appt.utc_offset_minutes * 60).unwrap_or(Utc.fix());
    let local = appt.starts_at.with_timezone(&offset);

    let mut vars = TemplateVars::new();
    vars.insert("client_name".into(), appt.client_name.clone());
    vars.insert("studio_name".into(), appt.studio_name.clone());
    vars.insert("service_name".into(), appt.service_name.clone());
    vars.insert("appointment_date".into(), local.format("%d/%m/%Y").to_string());
    vars.insert("appointment_time".into(), local.format("%H:%M").to_string());
    vars
}
