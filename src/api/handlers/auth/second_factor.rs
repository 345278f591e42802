//! Second-factor verification endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::session;
use super::state::AuthState;
use super::types::{SessionResponse, VerifyOtpRequest, VerifyTotpRequest};
use super::utils::extract_client_ip;

#[utoipa::path(
    post,
    path = "/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Verification failed", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Response {
    let Some(Json(mut request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    if request.otp.trim().is_empty() || request.pre_token.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing code".to_string()).into_response();
    }
    if request.device_fingerprint.ip_address.is_none() {
        request.device_fingerprint.ip_address = extract_client_ip(&headers);
    }

    match auth_state
        .orchestrator()
        .verify_otp(
            request.user_id,
            request.otp.trim(),
            request.pre_token.trim(),
            &request.device_fingerprint,
            request.trust_device,
        )
        .await
    {
        Ok(bundle) => session_response(&auth_state, bundle.into()),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify-totp",
    request_body = VerifyTotpRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Verification failed", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_totp(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyTotpRequest>>,
) -> Response {
    let Some(Json(mut request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    if request.totp_code.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing code".to_string()).into_response();
    }
    if request.device_fingerprint.ip_address.is_none() {
        request.device_fingerprint.ip_address = extract_client_ip(&headers);
    }

    match auth_state
        .orchestrator()
        .verify_totp(
            request.user_id,
            request.totp_code.trim(),
            &request.device_fingerprint,
            request.trust_device,
        )
        .await
    {
        Ok(bundle) => session_response(&auth_state, bundle.into()),
        Err(err) => err.into_response(),
    }
}

fn session_response(auth_state: &AuthState, session_body: SessionResponse) -> Response {
    let mut response_headers = HeaderMap::new();
    session::apply_session_cookies(auth_state, &session_body, &mut response_headers);
    (StatusCode::OK, response_headers, Json(session_body)).into_response()
}
