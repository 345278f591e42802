//! Session cookies, bearer extraction, and logout.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::state::AuthState;
use super::types::SessionResponse;
use crate::auth::AuthError;

const ACCESS_COOKIE_NAME: &str = "access_token";
const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    if let Some(token) = extract_cookie(&headers, REFRESH_COOKIE_NAME) {
        if let Err(err) = auth_state.orchestrator().tokens().revoke(&token).await {
            error!("Failed to revoke refresh token on logout: {err}");
        }
    }

    // Always clear both cookies, even when no refresh token was presented.
    let mut response_headers = HeaderMap::new();
    clear_session_cookies(&auth_state, &mut response_headers);
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Resolve the caller's access token into a user id.
///
/// # Errors
/// `NotFound` when no token was presented; otherwise whatever token
/// verification returns.
pub(super) fn authenticate(headers: &HeaderMap, auth_state: &AuthState) -> Result<Uuid, AuthError> {
    let token = extract_bearer_token(headers)
        .or_else(|| extract_cookie(headers, ACCESS_COOKIE_NAME))
        .ok_or(AuthError::NotFound("access token"))?;
    auth_state.orchestrator().tokens().verify_access(&token)
}

/// Attach both session cookies to a response. Cookie lifetimes follow the
/// token expiries so a long-lived magic-link session keeps its cookie.
pub(super) fn apply_session_cookies(
    auth_state: &AuthState,
    session: &SessionResponse,
    headers: &mut HeaderMap,
) {
    let access_ttl = remaining_seconds(session.access_expires_at);
    let refresh_ttl = remaining_seconds(session.refresh_expires_at);
    let cookies = [
        session_cookie(auth_state, ACCESS_COOKIE_NAME, &session.access_token, access_ttl),
        session_cookie(auth_state, REFRESH_COOKIE_NAME, &session.refresh_token, refresh_ttl),
    ];
    for cookie in cookies {
        match cookie {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => error!("Failed to build session cookie: {err}"),
        }
    }
}

pub(super) fn clear_session_cookies(auth_state: &AuthState, headers: &mut HeaderMap) {
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        match session_cookie(auth_state, name, "", 0) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => error!("Failed to build clearing cookie: {err}"),
        }
    }
}

fn remaining_seconds(expires_at: chrono::DateTime<Utc>) -> i64 {
    (expires_at - Utc::now()).num_seconds().max(0)
}

fn session_cookie(
    auth_state: &AuthState,
    name: &str,
    value: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}");
    if auth_state.config().session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        if key.trim() == name && !val.trim().is_empty() {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
