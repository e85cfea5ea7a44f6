use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::AppState;

/// Extractor for scheduler-only endpoints: the `X-Cron-Key` header must
/// match `config.cron_secret`.
pub struct CronAuth;

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("X-Cron-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing X-Cron-Key header"))?;

        if key != state.config.cron_secret {
            return Err((StatusCode::UNAUTHORIZED, "Invalid cron key"));
        }

        Ok(CronAuth)
    }
}
