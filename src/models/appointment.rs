use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const PAYMENT_APPROVED: &str = "approved";

/// Read-only view of a booking, joined with its studio, as needed by the
/// scheduling rules.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub client_name: String,
    pub client_phone: String,
    pub service_name: String,
    pub starts_at: DateTime<Utc>,
    pub payment_status: String,
    pub studio_name: String,
    /// Offset used to format local dates in messages (e.g. -180 for UTC-3).
    pub utc_offset_minutes: i32,
}

impl Appointment {
    pub fn payment_approved(&self) -> bool {
        self.payment_status == PAYMENT_APPROVED
    }
}

#[derive(Debug, Deserialize)]
pub struct AppointmentEventRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct GalleryReadyRequest {
    pub appointment_id: Uuid,
    pub gallery_link: String,
    pub photo_count: i64,
    #[serde(default)]
    pub previous_photo_count: i64,
    pub min_photos: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SelectionSubmittedRequest {
    pub appointment_id: Uuid,
    pub selected_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentApprovedRequest {
    pub appointment_id: Uuid,
    pub amount: String,
}
