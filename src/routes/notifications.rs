use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use super::{internal, ApiError};
use crate::{
    db::store::NotificationStore,
    middleware::{
        auth::{require_admin, require_staff},
        cron::CronAuth,
        rate_limit::{check_rate_limit, rate_key},
        tenant::TenantSlug,
    },
    models::{
        auth::AuthenticatedUser,
        notification::{NotificationFilter, NotificationStatus},
    },
    services::{
        delivery::SweepError,
        scheduler::{ResendError, ScheduleOutcome},
    },
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct SweepQuery {
    pub max_batch: Option<i64>,
}

/// POST /send-scheduled-notifications: run one delivery sweep for the studio.
pub async fn send_scheduled_notifications(
    State(state): State<AppState>,
    _cron: CronAuth,
    TenantSlug(tenant): TenantSlug,
    Query(query): Query<SweepQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &rate_key("sweep", &tenant, "trigger"), 30, 60).await?;

    let max_batch = query.max_batch.unwrap_or(state.config.delivery_batch_size);
    match state.worker.process_due(&tenant, max_batch).await {
        Ok(report) => Ok(Json(json!({
            "success": true,
            "processed": report.processed,
            "sent": report.sent,
            "failed": report.failed,
            "skipped": report.skipped,
            "interrupted": report.interrupted,
            "results": report.results,
        }))),
        Err(e) => {
            let status = sweep_error_status(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                warn!("Sweep for '{tenant}' failed: {e}");
            }
            Err((status, Json(json!({ "success": false, "error": e.to_string() }))))
        }
    }
}

fn sweep_error_status(e: &SweepError) -> StatusCode {
    match e {
        SweepError::NoActiveGateway => StatusCode::UNPROCESSABLE_ENTITY,
        SweepError::AlreadyRunning => StatusCode::CONFLICT,
        SweepError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /notifications: newest first, filtered by status and event.
pub async fn list_notifications(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Value>, ApiError> {
    require_staff(&user, &tenant)?;
    let items = state.store.list(&tenant, &filter).await.map_err(internal)?;
    Ok(Json(json!({
        "page": filter.page.unwrap_or(1).max(1),
        "per_page": filter.per_page(),
        "items": items,
    })))
}

/// GET /notifications/summary: row count per status.
pub async fn summary(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_staff(&user, &tenant)?;
    let counts = state.store.count_by_status(&tenant).await.map_err(internal)?;
    Ok(Json(summary_json(&counts)))
}

fn summary_json(counts: &[(String, i64)]) -> Value {
    let mut out = serde_json::Map::new();
    for status in [
        NotificationStatus::Pending,
        NotificationStatus::Processing,
        NotificationStatus::Sent,
        NotificationStatus::Failed,
        NotificationStatus::Cancelled,
    ] {
        let count = counts
            .iter()
            .find(|(s, _)| s == status.as_str())
            .map_or(0, |(_, c)| *c);
        out.insert(status.as_str().to_string(), json!(count));
    }
    Value::Object(out)
}

/// POST /notifications/{id}/resend: queue a fresh copy of a finished row.
pub async fn resend(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_admin(&user, &tenant)?;
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &rate_key("resend", &tenant, &user.user_id.to_string()), 20, 3600).await?;

    match state.scheduler.resend(&tenant, id).await {
        Ok(outcome) => Ok((resend_status(outcome), Json(json!({ "outcome": outcome })))),
        Err(ResendError::NotFound) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Notification not found" })),
        )),
        Err(e @ ResendError::StillOpen(_)) => {
            Err((StatusCode::CONFLICT, Json(json!({ "error": e.to_string() }))))
        }
        Err(ResendError::Store(e)) => Err(internal(e)),
    }
}

fn resend_status(outcome: ScheduleOutcome) -> StatusCode {
    match outcome {
        ScheduleOutcome::Scheduled => StatusCode::CREATED,
        ScheduleOutcome::Duplicate | ScheduleOutcome::SkippedPast => StatusCode::OK,
        ScheduleOutcome::Invalid | ScheduleOutcome::Failed => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_status() {
        let value = summary_json(&[("sent".into(), 4), ("failed".into(), 1)]);
        assert_eq!(
            value,
            json!({ "pending": 0, "processing": 0, "sent": 4, "failed": 1, "cancelled": 0 })
        );
    }

    #[test]
    fn sweep_errors_map_to_distinct_statuses() {
        assert_eq!(sweep_error_status(&SweepError::NoActiveGateway), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(sweep_error_status(&SweepError::AlreadyRunning), StatusCode::CONFLICT);
    }

    #[test]
    fn resend_of_a_duplicate_is_not_an_error() {
        assert_eq!(resend_status(ScheduleOutcome::Duplicate), StatusCode::OK);
        assert_eq!(resend_status(ScheduleOutcome::Failed), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
