use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{internal, ApiError};
use crate::{
    db::store::TemplateStore,
    middleware::{auth::require_admin, tenant::TenantSlug},
    models::{
        auth::AuthenticatedUser,
        notification::template_types,
        template::{PreviewTemplateRequest, UpsertTemplateRequest},
    },
    services::templates::substitute,
    AppState,
};

fn known_type(template_type: &str) -> Result<(), ApiError> {
    if template_types::ALL.contains(&template_type) {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Unknown template type '{template_type}'") })),
        ))
    }
}

pub async fn list_templates(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user, &tenant)?;
    let templates = state.store.list_templates(&tenant).await.map_err(internal)?;
    Ok(Json(json!(templates)))
}

/// PUT /notification-templates/{type}: edits apply to rows already queued.
pub async fn upsert_template(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Path(template_type): Path<String>,
    Json(body): Json<UpsertTemplateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user, &tenant)?;
    known_type(&template_type)?;
    if body.message_template.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "message_template must not be empty" })),
        ));
    }

    let template = state
        .store
        .upsert_template(&tenant, &template_type, &body.message_template, body.is_active.unwrap_or(true))
        .await
        .map_err(internal)?;
    Ok(Json(json!(template)))
}

/// POST /notification-templates/{type}/preview: render with sample variables.
pub async fn preview_template(
    State(state): State<AppState>,
    TenantSlug(tenant): TenantSlug,
    user: AuthenticatedUser,
    Path(template_type): Path<String>,
    Json(body): Json<PreviewTemplateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&user, &tenant)?;
    let template = state
        .store
        .list_templates(&tenant)
        .await
        .map_err(internal)?
        .into_iter()
        .find(|t| t.template_type == template_type)
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "Template not found" }))))?;

    let rendered = substitute(&template.message_template, &body.variables);
    Ok(Json(json!({
        "type": template.template_type,
        "is_active": template.is_active,
        "text": rendered.text,
        "missing": rendered.missing,
    })))
}
