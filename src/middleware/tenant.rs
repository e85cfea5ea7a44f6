use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::AppState;

/// Lowercase ASCII letters, digits and inner hyphens, 2 to 63 characters.
/// The slug ends up in `format!()` schema names, so nothing else may pass.
pub fn is_valid_slug(s: &str) -> bool {
    let len = s.len();
    (2..=63).contains(&len)
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// Studio slug from the `X-Tenant` header or the first subdomain, checked
/// against `public.studios`.
#[derive(Debug, Clone)]
pub struct TenantSlug(pub String);

impl FromRequestParts<AppState> for TenantSlug {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = extract_slug(parts)?;

        let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM public.studios WHERE slug = $1")
            .bind(&slug)
            .fetch_optional(&state.db)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Database error" }))))?;

        match active {
            None => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Studio not found" })))),
            Some(false) => Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Studio is inactive" })))),
            Some(true) => Ok(TenantSlug(slug)),
        }
    }
}

fn extract_slug(parts: &Parts) -> Result<String, (StatusCode, Json<Value>)> {
    let invalid = || (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid tenant identifier" })));

    if let Some(tenant) = parts
        .headers
        .get("X-Tenant")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
    {
        return if is_valid_slug(&tenant) { Ok(tenant) } else { Err(invalid()) };
    }

    if let Some(host) = parts.headers.get("Host").and_then(|v| v.to_str().ok()) {
        let domain = host.split(':').next().unwrap_or(host);
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() >= 3 {
            let subdomain = labels[0].to_lowercase();
            if subdomain != "www" && subdomain != "api" {
                return if is_valid_slug(&subdomain) { Ok(subdomain) } else { Err(invalid()) };
            }
        }
    }

    Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing X-Tenant header" }))))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;
    use crate::middleware::auth::require_staff;
    use crate::models::{auth::AuthenticatedUser, user::UserRole};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/notifications");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("studio-luz"));
        assert!(is_valid_slug("a1"));
        assert!(!is_valid_slug("a"));
        assert!(!is_valid_slug("-luz"));
        assert!(!is_valid_slug("luz_x"));
        assert!(!is_valid_slug("luz\"; DROP"));
    }

    #[test]
    fn header_wins_over_subdomain() {
        let p = parts(&[("X-Tenant", "Acme"), ("Host", "other.shutterbook.app")]);
        assert_eq!(extract_slug(&p).unwrap(), "acme");
    }

    #[test]
    fn subdomain_is_used_without_header() {
        assert_eq!(extract_slug(&parts(&[("Host", "luz.shutterbook.app:443")])).unwrap(), "luz");
        assert!(extract_slug(&parts(&[("Host", "api.shutterbook.app")])).is_err());
        assert!(extract_slug(&parts(&[("Host", "localhost:8080")])).is_err());
    }

    #[test]
    fn subdomain_studio_is_checked_against_the_token() {
        let acme_admin = AuthenticatedUser {
            user_id: uuid::Uuid::new_v4(),
            tenant: "acme".into(),
            role: UserRole::StudioAdmin,
        };
        let tenant = extract_slug(&parts(&[("Host", "rival.shutterbook.app")])).unwrap();

        assert_eq!(tenant, "rival");
        assert_eq!(require_staff(&acme_admin, &tenant).unwrap_err().0, StatusCode::FORBIDDEN);
    }
}
