use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;

use super::services::{resolve_current_user, JwtKeys, SESSION_COOKIE};
use crate::{db::User, error::AppError, state::AppState};

/// The authenticated caller with the role flags used for course visibility.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub login_id: Option<String>,
    pub is_admin: bool,
    pub is_instructor: bool,
}

/// Bearer token from the Authorization header, falling back to the session cookie.
pub(crate) fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        return auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(|t| t.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing credentials".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        resolve_current_user(state.store.as_ref(), claims.sub).await
    }
}
