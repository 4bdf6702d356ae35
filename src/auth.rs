use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SupabaseUser {
    pub id: String,
    pub email: Option<String>,
}

/// Resolve the authenticated user id from the request headers.
///
/// Order: the `x-user-id` dev override (non-production only), then the
/// `Authorization: Bearer <jwt>` Supabase access token verified with the
/// project JWT secret (HS256).
pub async fn require_user_id(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    Ok(require_user(state, headers).await?.id)
}

pub async fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<SupabaseUser, AppError> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(user_id) = header_value(headers, "x-user-id") {
            return Ok(SupabaseUser {
                id: user_id,
                email: None,
            });
        }
    }

    let token = bearer_token(headers).ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: missing bearer token.".to_string())
    })?;

    let secret = state.config.supabase_jwt_secret.as_deref().ok_or_else(|| {
        AppError::Dependency(
            "Auth is not configured. Set SUPABASE_JWT_SECRET.".to_string(),
        )
    })?;

    let mut validation = Validation::new(Algorithm::HS256);
    // Supabase issues tokens with aud "authenticated"; older projects omit it.
    validation.validate_aud = false;

    let decoded = decode::<SupabaseClaims>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|error| {
        tracing::debug!(error = %error, "JWT verification failed");
        AppError::Unauthorized("Unauthorized: invalid or expired token.".to_string())
    })?;

    let user_id = decoded.claims.sub.trim().to_string();
    if user_id.is_empty() {
        return Err(AppError::Unauthorized(
            "Unauthorized: token has no subject.".to_string(),
        ));
    }

    Ok(SupabaseUser {
        id: user_id,
        email: decoded.claims.email,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = header_value(headers, "authorization")?;
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;

    use super::bearer_token;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_non_bearer_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        let mut empty = HeaderMap::new();
        empty.insert("authorization", "Bearer ".parse().unwrap());
        assert!(bearer_token(&empty).is_none());
    }
}
