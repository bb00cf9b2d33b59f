use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::error::Payload;
use crate::auth::{self, Session, User};
use crate::error::{AppError, AppResult, AUTH_DISABLED_CODE};
use crate::state::AppState;

#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    #[ts(type = "number")]
    pub expires_at: i64,
}

fn login_disabled() -> AppError {
    AppError::new(AUTH_DISABLED_CODE, "login is disabled")
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Gate for management routes. Always passes when login is disabled;
/// otherwise requires a live bearer token.
pub struct RequireSession(pub Option<Session>);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !state.config.login_enabled {
            return Ok(RequireSession(None));
        }
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("login required"))?;
        state
            .sessions
            .resolve(token)
            .map(|session| RequireSession(Some(session)))
            .ok_or_else(|| AppError::unauthorized("session is invalid or expired"))
    }
}

pub async fn login(
    State(state): State<AppState>,
    Payload(body): Payload<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if !state.config.login_enabled {
        return Err(login_disabled());
    }
    let user = auth::authenticate(&state.pool, &body.username, &body.password).await?;
    let session = state.sessions.issue(&user);
    Ok(Json(LoginResponse {
        token: session.token,
        user,
        expires_at: session.expires_at,
    }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<StatusCode> {
    if !state.config.login_enabled {
        return Err(login_disabled());
    }
    let token = bearer_token(&headers).ok_or_else(|| AppError::unauthorized("login required"))?;
    // Revoking an unknown or expired token is still a successful logout.
    state.sessions.revoke(token);
    Ok(StatusCode::NO_CONTENT)
}
