use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser},
        extractors::CurrentUser,
        services::{
            authenticate, expired_session_cookie, is_valid_login_id, resolve_current_user,
            session_cookie, JwtKeys,
        },
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn set_cookie(value: String) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid cookie header: {e}")))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>), AppError> {
    let login_id = payload.login_id.trim();

    if !is_valid_login_id(login_id) {
        warn!("invalid login id");
        return Err(AppError::BadRequest("Invalid login id".into()));
    }

    let user = authenticate(state.store.as_ref(), login_id).await?;
    let current = resolve_current_user(state.store.as_ref(), user.user_id).await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(user.user_id).map_err(AppError::Internal)?;
    let headers = set_cookie(session_cookie(
        &access_token,
        keys.ttl,
        state.config.cookie_secure,
    ))?;

    info!(user_id = user.user_id, login_id, is_admin = current.is_admin, "user logged in");
    Ok((
        headers,
        Json(LoginResponse {
            access_token,
            token_type: "Bearer",
            expires_in: keys.ttl.as_secs(),
            user: current.public(),
        }),
    ))
}

#[instrument]
pub async fn logout() -> Result<(HeaderMap, Json<serde_json::Value>), AppError> {
    let headers = set_cookie(expired_session_cookie())?;
    Ok((headers, Json(serde_json::json!({ "ok": true }))))
}

#[instrument(skip(current), fields(user_id = current.user.user_id))]
pub async fn get_me(current: CurrentUser) -> Json<PublicUser> {
    Json(current.public())
}
