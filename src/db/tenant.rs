use sqlx::PgPool;

use crate::models::notification::template_types;

/// Default message texts seeded into every new studio. Studio admins edit
/// them afterwards; seeding never overwrites an existing row.
const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (
        template_types::REMINDER_1_DAY_BEFORE,
        "Olá {{client_name}}! Lembrete: seu ensaio de {{service_name}} no {{studio_name}} é amanhã, {{appointment_date}} às {{appointment_time}}.",
    ),
    (
        template_types::REMINDER_2_HOURS_BEFORE,
        "Olá {{client_name}}! Seu ensaio de {{service_name}} começa hoje às {{appointment_time}}. Até já!",
    ),
    (
        template_types::GALLERY_READY,
        "Olá {{client_name}}, suas fotos estão prontas! Acesse {{gallery_link}} para escolher suas favoritas.",
    ),
    (
        template_types::SELECTION_REMINDER,
        "Olá {{client_name}}, não esqueça de fazer a seleção das suas fotos em {{gallery_link}}.",
    ),
    (
        template_types::SELECTION_RECEIVED,
        "Olá {{client_name}}, recebemos sua seleção de {{selected_count}} fotos. Obrigado! {{studio_name}}",
    ),
    (
        template_types::PAYMENT_RECEIVED,
        "Olá {{client_name}}, confirmamos o pagamento de {{amount}} referente a {{service_name}}. {{studio_name}}",
    ),
];

/// Provision a per-studio PostgreSQL schema with the notification tables.
/// Idempotent; run on startup for every active studio.
pub async fn provision_tenant_schema(pool: &PgPool, slug: &str) -> anyhow::Result<()> {
    let schema = schema_name(slug);

    sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(pool)
        .await?;

    // --- Templates ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".notification_templates (
            id               UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            type             VARCHAR(64) UNIQUE NOT NULL,
            message_template TEXT NOT NULL,
            is_active        BOOLEAN NOT NULL DEFAULT TRUE,
            created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Scheduled notifications ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".scheduled_notifications (
            id                UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            business_event_id UUID NOT NULL,
            template_type     VARCHAR(64) NOT NULL,
            recipient_phone   VARCHAR(32) NOT NULL,
            recipient_name    VARCHAR(255) NOT NULL,
            rendered_message  TEXT NOT NULL,
            variables         JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            scheduled_for     TIMESTAMPTZ NOT NULL,
            status            VARCHAR(16) NOT NULL DEFAULT 'pending'
                              CHECK (status IN ('pending','processing','sent','failed','cancelled')),
            sent_at           TIMESTAMPTZ,
            error_message     TEXT,
            created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    sqlx::raw_sql(&format!(
        r#"CREATE INDEX IF NOT EXISTS scheduled_notifications_due_idx
             ON "{schema}".scheduled_notifications (scheduled_for)
             WHERE status = 'pending';
           CREATE INDEX IF NOT EXISTS scheduled_notifications_event_idx
             ON "{schema}".scheduled_notifications (business_event_id, template_type)"#
    ))
    .execute(pool)
    .await?;

    // --- Gateway instances ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".gateway_instances (
            id            UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            instance_name VARCHAR(128) NOT NULL,
            status        VARCHAR(32) NOT NULL DEFAULT 'created',
            api_url       TEXT NOT NULL,
            api_key       TEXT NOT NULL,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Appointments (owned by the booking flow, read here) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".appointments (
            id             UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            client_name    VARCHAR(255) NOT NULL,
            client_phone   VARCHAR(32) NOT NULL,
            service_name   VARCHAR(255) NOT NULL,
            starts_at      TIMESTAMPTZ NOT NULL,
            payment_status VARCHAR(32) NOT NULL DEFAULT 'pending',
            created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    for (template_type, text) in DEFAULT_TEMPLATES {
        sqlx::query(&format!(
            r#"INSERT INTO "{schema}".notification_templates (type, message_template)
               VALUES ($1, $2)
               ON CONFLICT (type) DO NOTHING"#
        ))
        .bind(template_type)
        .bind(text)
        .execute(pool)
        .await?;
    }

    // --- updated_at trigger function ---
    sqlx::raw_sql(&format!(
        r#"CREATE OR REPLACE FUNCTION "{schema}".update_updated_at()
           RETURNS TRIGGER AS $fn$
           BEGIN NEW.updated_at = NOW(); RETURN NEW; END;
           $fn$ LANGUAGE plpgsql"#
    ))
    .execute(pool)
    .await?;

    for table in &["notification_templates", "scheduled_notifications"] {
        let trigger = format!("{table}_updated_at");
        sqlx::raw_sql(&format!(
            r#"DROP TRIGGER IF EXISTS "{trigger}" ON "{schema}"."{table}";
               CREATE TRIGGER "{trigger}"
               BEFORE UPDATE ON "{schema}"."{table}"
               FOR EACH ROW EXECUTE FUNCTION "{schema}".update_updated_at()"#
        ))
        .execute(pool)
        .await?;
    }

    tracing::info!("Provisioned tenant schema: {schema}");
    Ok(())
}

/// Returns the PostgreSQL schema name for a given studio slug.
pub fn schema_name(slug: &str) -> String {
    format!("studio_{}", slug.to_lowercase().replace('-', "_"))
}
