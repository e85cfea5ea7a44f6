use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Variables substituted into `{{key}}` placeholders of a template.
pub type TemplateVars = BTreeMap<String, String>;

/// Built-in template types produced by the scheduling rules.
pub mod template_types {
    pub const REMINDER_1_DAY_BEFORE: &str = "reminder_1_day_before";
    pub const REMINDER_2_HOURS_BEFORE: &str = "reminder_2_hours_before";
    pub const GALLERY_READY: &str = "gallery_ready";
    pub const SELECTION_REMINDER: &str = "selection_reminder";
    pub const SELECTION_RECEIVED: &str = "selection_received";
    pub const PAYMENT_RECEIVED: &str = "payment_received";

    pub const ALL: &[&str] = &[
        REMINDER_1_DAY_BEFORE,
        REMINDER_2_HOURS_BEFORE,
        GALLERY_READY,
        SELECTION_REMINDER,
        SELECTION_RECEIVED,
        PAYMENT_RECEIVED,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Processing => "processing",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Sent | NotificationStatus::Failed | NotificationStatus::Cancelled
        )
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "processing" => Ok(NotificationStatus::Processing),
            "sent" => Ok(NotificationStatus::Sent),
            "failed" => Ok(NotificationStatus::Failed),
            "cancelled" => Ok(NotificationStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Unknown notification status: {s}")),
        }
    }
}

/// DB row. `status` is stored as TEXT and parsed on demand.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub business_event_id: Uuid,
    pub template_type: String,
    pub recipient_phone: String,
    pub recipient_name: String,
    pub rendered_message: String,
    pub variables: Json<TemplateVars>,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Last status change; a finished row's age is measured from here.
    pub updated_at: DateTime<Utc>,
}

impl ScheduledNotification {
    pub fn status(&self) -> Option<NotificationStatus> {
        self.status.parse().ok()
    }
}

/// Row to insert as `pending`.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub business_event_id: Uuid,
    pub template_type: String,
    pub recipient_phone: String,
    pub recipient_name: String,
    pub rendered_message: String,
    pub variables: TemplateVars,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    pub status: Option<NotificationStatus>,
    pub event_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl NotificationFilter {
    pub fn offset(&self) -> i64 {
        let page = self.page.unwrap_or(1).max(1);
        (page - 1).saturating_mul(self.per_page())
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!("cancelled".parse::<NotificationStatus>().unwrap(), NotificationStatus::Cancelled);
        assert!("delivered".parse::<NotificationStatus>().is_err());
    }

    #[test]
    fn only_pending_and_processing_are_open() {
        assert!(!NotificationStatus::Pending.is_terminal());
        assert!(!NotificationStatus::Processing.is_terminal());
        assert!(NotificationStatus::Sent.is_terminal());
        assert!(NotificationStatus::Failed.is_terminal());
        assert!(NotificationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn filter_pagination_is_clamped() {
        let f = NotificationFilter { page: Some(0), per_page: Some(500), ..Default::default() };
        assert_eq!(f.per_page(), 100);
        assert_eq!(f.offset(), 0);

        let f = NotificationFilter { page: Some(3), per_page: None, ..Default::default() };
        assert_eq!(f.offset(), 40);
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let f = NotificationFilter { page: Some(i64::MAX), per_page: Some(100), ..Default::default() };
        assert_eq!(f.offset(), i64::MAX);
    }
}
