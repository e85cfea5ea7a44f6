use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::notification::TemplateVars;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationTemplate {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub template_type: String,
    pub message_template: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertTemplateRequest {
    pub message_template: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewTemplateRequest {
    #[serde(default)]
    pub variables: TemplateVars,
}
