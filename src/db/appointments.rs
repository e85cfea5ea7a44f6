use sqlx::PgPool;
use uuid::Uuid;

use super::tenant::schema_name;
use crate::models::appointment::Appointment;

/// Load an appointment together with the studio fields used in messages.
pub async fn find_appointment(pool: &PgPool, tenant: &str, id: Uuid) -> anyhow::Result<Option<Appointment>> {
    let schema = schema_name(tenant);
    let row = sqlx::query_as::<_, Appointment>(&format!(
        r#"SELECT a.id, a.client_name, a.client_phone, a.service_name, a.starts_at,
                  a.payment_status, s.name AS studio_name, s.utc_offset_minutes
           FROM "{schema}".appointments a
           JOIN public.studios s ON s.slug = $2
           WHERE a.id = $1"#
    ))
    .bind(id)
    .bind(tenant)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
