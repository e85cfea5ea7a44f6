//! Business-event hooks called by the booking, gallery, selection and
//! payment flows. Notification problems never fail the caller: the response
//! is `200` with one outcome per rule.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use super::{internal, ApiError};
use crate::{
    db::appointments::find_appointment,
    middleware::{auth::require_staff, tenant::TenantSlug},
    models::{
        appointment::{
            Appointment, AppointmentEventRequest, GalleryReadyRequest, PaymentApprovedRequest,
            SelectionSubmittedRequest,
        },
        auth::AuthenticatedUser,
    },
    services::scheduler::{GalleryReady, RuleResult},
    AppState,
};

/// Photos required before a gallery counts as ready when the caller sends no minimum.
const DEFAULT_MIN_PHOTOS: i64 = 1;

async fn load(state: &AppState, tenant: &str, id: Uuid) -> Result<Appointment, ApiError> {
    found_or_404(find_appointment(&state.db, tenant, id).await)
}

/// Only the appointment lookup can fail an event hook.
fn found_or_404(found: anyhow::Result<Option<Appointment>>) -> Result<Appointment, ApiError> {
    found
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "Appointment not found" }))))
}

fn outcomes(appt: &Appointment, results: Vec<RuleResult>) -> Json<Value> {
    Json(json!({ "appointment_id": appt.id, "results": results }))
}

fn cancellation(tenant: &str, appointment_id: Uuid, cancelled: anyhow::Result<u64>) -> Json<Value> {
    match cancelled {
        Ok(cancelled) => Json(json!({ "appointment_id": appointment_id, "cancelled": cancelled })),
        Err(e) => {
            warn!("Cannot cancel notifications of {appointment_id} in '{tenant}': {e}");
            Json(json!({ "appointment_id": appointment_id, "cancelled": 0, "error": e.to_string() }))
        }
    }
}

pub async fn appointment_created(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Json(body): Json<AppointmentEventRequest>,
) -> Result<Json<Value>, ApiError> {
    require_staff(&user, &tenant)?;
    let appt = load(&state, &tenant, body.appointment_id).await?;
    let results = state.scheduler.on_appointment_created(&tenant, &appt, Utc::now()).await;
    Ok(outcomes(&appt, results))
}

pub async fn appointment_cancelled(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Json(body): Json<AppointmentEventRequest>,
) -> Result<Json<Value>, ApiError> {
    require_staff(&user, &tenant)?;
    let appt = load(&state, &tenant, body.appointment_id).await?;
    let cancelled = state.scheduler.cancel_for_event(&tenant, appt.id).await;
    Ok(cancellation(&tenant, appt.id, cancelled))
}

pub async fn gallery_ready(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Json(body): Json<GalleryReadyRequest>,
) -> Result<Json<Value>, ApiError> {
    require_staff(&user, &tenant)?;
    let appt = load(&state, &tenant, body.appointment_id).await?;
    let gallery = GalleryReady {
        gallery_link: body.gallery_link,
        photo_count: body.photo_count,
        previous_photo_count: body.previous_photo_count,
        min_photos: body.min_photos.unwrap_or(DEFAULT_MIN_PHOTOS),
    };
    let results = state.scheduler.on_gallery_ready(&tenant, &appt, &gallery, Utc::now()).await;
    Ok(outcomes(&appt, results))
}

pub async fn selection_submitted(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Json(body): Json<SelectionSubmittedRequest>,
) -> Result<Json<Value>, ApiError> {
    require_staff(&user, &tenant)?;
    let appt = load(&state, &tenant, body.appointment_id).await?;
    let results = state
        .scheduler
        .on_selection_submitted(&tenant, &appt, body.selected_count, Utc::now())
        .await;
    Ok(outcomes(&appt, results))
}

pub async fn payment_approved(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Json(body): Json<PaymentApprovedRequest>,
) -> Result<Json<Value>, ApiError> {
    require_staff(&user, &tenant)?;
    let appt = load(&state, &tenant, body.appointment_id).await?;
    let results = state
        .scheduler
        .on_payment_approved(&tenant, &appt, &body.amount, Utc::now())
        .await;
    Ok(outcomes(&appt, results))
}
