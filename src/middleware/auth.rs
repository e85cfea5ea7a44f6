use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};

use crate::models::auth::{AuthenticatedUser, Claims};
use crate::models::user::UserRole;

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing Authorization header"))?
            .strip_prefix("Bearer ")
            .ok_or((StatusCode::UNAUTHORIZED, "Invalid Authorization header format"))?;

        let secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "JWT secret not configured"))?;

        let user = decode_access_token(token, &secret.0)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

        // Only super-admins may act on a studio other than the one in their token.
        if user.role != UserRole::SuperAdmin {
            if let Some(requested) = parts.headers.get("X-Tenant").and_then(|v| v.to_str().ok()) {
                if user.tenant != requested.to_lowercase() {
                    return Err((StatusCode::FORBIDDEN, "Tenant mismatch"));
                }
            }
        }

        Ok(user)
    }
}

/// Extension type to carry the JWT secret through request extensions.
#[derive(Clone)]
pub struct JwtSecret(pub String);

pub fn decode_access_token(token: &str, secret: &str) -> Result<AuthenticatedUser, anyhow::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let claims = decode::<Claims>(token, &key, &validation)?.claims;

    Ok(AuthenticatedUser {
        user_id: claims.sub.parse()?,
        tenant: claims.tenant,
        role: claims.role,
    })
}

/// The studio resolved for the request (header or subdomain) must be the
/// one in the token. Super-admins may act on any studio.
pub fn ensure_tenant(user: &AuthenticatedUser, tenant: &str) -> Result<(), (StatusCode, Json<Value>)> {
    if user.role == UserRole::SuperAdmin || user.tenant == tenant {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Tenant mismatch" }))))
    }
}

/// Studio admins and super-admins of `tenant`.
pub fn require_admin(user: &AuthenticatedUser, tenant: &str) -> Result<(), (StatusCode, Json<Value>)> {
    ensure_tenant(user, tenant)?;
    if user.is_admin() {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Admin role required" }))))
    }
}

/// Anyone working for `tenant`; clients are refused.
pub fn require_staff(user: &AuthenticatedUser, tenant: &str) -> Result<(), (StatusCode, Json<Value>)> {
    ensure_tenant(user, tenant)?;
    if user.is_staff() {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Staff role required" }))))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    use super::*;

    fn token(role: UserRole, exp_offset: i64, secret: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            tenant: "acme".into(),
            role,
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_the_user() {
        let user = decode_access_token(&token(UserRole::Photographer, 900, "s3cret"), "s3cret").unwrap();
        assert_eq!(user.tenant, "acme");
        assert!(require_staff(&user, "acme").is_ok());
        assert!(require_admin(&user, "acme").is_err());
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        assert!(decode_access_token(&token(UserRole::StudioAdmin, -3600, "s3cret"), "s3cret").is_err());
        assert!(decode_access_token(&token(UserRole::StudioAdmin, 900, "other"), "s3cret").is_err());
    }

    #[test]
    fn clients_are_not_staff() {
        let user = decode_access_token(&token(UserRole::Client, 900, "k"), "k").unwrap();
        assert_eq!(require_staff(&user, "acme").unwrap_err().0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn token_of_one_studio_cannot_act_on_another() {
        let admin = decode_access_token(&token(UserRole::StudioAdmin, 900, "k"), "k").unwrap();
        assert!(require_admin(&admin, "acme").is_ok());
        assert_eq!(require_admin(&admin, "rival").unwrap_err().0, StatusCode::FORBIDDEN);
        assert_eq!(require_staff(&admin, "rival").unwrap_err().0, StatusCode::FORBIDDEN);

        let root = decode_access_token(&token(UserRole::SuperAdmin, 900, "k"), "k").unwrap();
        assert!(require_admin(&root, "rival").is_ok());
    }
}
