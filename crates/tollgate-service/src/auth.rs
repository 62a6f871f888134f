//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `SessionUser` - dashboard users holding a session cookie (HS256 JWT)
//! - `ApiCaller` - ingestion callers, by session first and then by
//!   `Authorization: Bearer <api key>`
//! - `AdminAuth` - admin authentication for privileged endpoints

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use tollgate_core::{constant_time_eq, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Claims carried by the session JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Expiration time (unix seconds).
    pub exp: i64,
    /// User email, if the issuer knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl SessionClaims {
    /// Claims for `user_id` expiring `ttl` from now.
    #[must_use]
    pub fn new(user_id: UserId, email: Option<String>, ttl: chrono::Duration) -> Self {
        Self {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now() + ttl).timestamp(),
            email,
        }
    }
}

/// Sign session claims with the HS256 `secret`.
///
/// # Errors
///
/// Returns `ApiError::Internal` if signing fails.
pub fn encode_session_token(claims: &SessionClaims, secret: &str) -> Result<String, ApiError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign session: {e}")))
}

/// A user authenticated by session cookie.
#[derive(Debug, Clone)]
pub struct SessionUser {
    /// The user ID.
    pub user_id: UserId,
    /// Email from the session claims.
    pub email: Option<String>,
}

/// How an `ApiCaller` was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Session cookie.
    Session,
    /// Bearer API key.
    ApiKey,
}

/// A caller of the public ingestion API.
#[derive(Debug, Clone)]
pub struct ApiCaller {
    /// The user the request is attributed to.
    pub user_id: UserId,
    /// Which credential matched.
    pub method: AuthMethod,
}

/// Read one cookie from the `Cookie` header(s).
fn cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Validate the session cookie, if any.
fn session_from_parts(parts: &Parts, state: &AppState) -> Option<SessionUser> {
    let secret = state.config.session_secret.as_deref()?;
    let token = cookie_value(parts, &state.config.session_cookie)?;

    let validation = Validation::new(Algorithm::HS256);
    let claims = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Session token validation failed");
    })
    .ok()?
    .claims;

    let user_id = claims.sub.parse::<UserId>().ok()?;
    Some(SessionUser {
        user_id,
        email: claims.email,
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        session_from_parts(parts, state).ok_or(ApiError::Unauthorized)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ApiCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(session) = session_from_parts(parts, state) {
            return Ok(ApiCaller {
                user_id: session.user_id,
                method: AuthMethod::Session,
            });
        }

        let api_key = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let user = state
            .store
            .find_user_by_api_key(api_key)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(ApiCaller {
            user_id: user.id,
            method: AuthMethod::ApiKey,
        })
    }
}

/// Admin authentication via the `X-Admin-Key` header.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = parts
            .headers
            .get("x-admin-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if !constant_time_eq(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(cookie: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .header("cookie", cookie)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn cookie_lookup_finds_named_value() {
        let parts = parts_with_cookie("theme=dark; tollgate_session=abc.def; other=1");
        assert_eq!(cookie_value(&parts, "tollgate_session"), Some("abc.def"));
        assert_eq!(cookie_value(&parts, "missing"), None);
    }

    #[test]
    fn session_round_trip() {
        let user_id = UserId::generate();
        let claims = SessionClaims::new(user_id, Some("me@x.io".into()), chrono::Duration::hours(1));
        let token = encode_session_token(&claims, "secret").unwrap();

        let config = crate::ServiceConfig {
            session_secret: Some("secret".into()),
            ..Default::default()
        };
        let state = AppState::new(Arc::new(tollgate_store::MemoryStore::new()), config);
        let parts = parts_with_cookie(&format!("tollgate_session={token}"));

        let session = session_from_parts(&parts, &state).unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.email.as_deref(), Some("me@x.io"));
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let user_id = UserId::generate();
        let config = crate::ServiceConfig {
            session_secret: Some("secret".into()),
            ..Default::default()
        };
        let state = AppState::new(Arc::new(tollgate_store::MemoryStore::new()), config);

        let forged = encode_session_token(
            &SessionClaims::new(user_id, None, chrono::Duration::hours(1)),
            "other",
        )
        .unwrap();
        let parts = parts_with_cookie(&format!("tollgate_session={forged}"));
        assert!(session_from_parts(&parts, &state).is_none());

        let expired = encode_session_token(
            &SessionClaims::new(user_id, None, chrono::Duration::hours(-2)),
            "secret",
        )
        .unwrap();
        let parts = parts_with_cookie(&format!("tollgate_session={expired}"));
        assert!(session_from_parts(&parts, &state).is_none());
    }
}
