//! First login step: method selection and password verification.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::state::AuthState;
use super::types::{LoginRequest, LoginResponse, SessionResponse};
use super::utils::{extract_client_ip, normalize_email, valid_email};
use super::session;
use crate::auth::LoginOutcome;

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login accepted; see status field", body = LoginResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Authentication failed", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(mut request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.device_fingerprint.ip_address.is_none() {
        request.device_fingerprint.ip_address = extract_client_ip(&headers);
    }

    let outcome = match auth_state
        .orchestrator()
        .login(&email, request.password.as_deref(), &request.device_fingerprint)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => return err.into_response(),
    };

    match outcome {
        LoginOutcome::CheckAccount => Json(LoginResponse {
            status: "check_account".to_string(),
            message: "Please check your account for further instructions".to_string(),
            user_id: None,
            pre_token: None,
            session: None,
        })
        .into_response(),
        LoginOutcome::RequiresTotp { user_id } => Json(LoginResponse {
            status: "totp_required".to_string(),
            message: "Enter the code from your authenticator app".to_string(),
            user_id: Some(user_id),
            pre_token: None,
            session: None,
        })
        .into_response(),
        LoginOutcome::RequiresOtp { user_id, pre_token } => Json(LoginResponse {
            status: "otp_required".to_string(),
            message: "A verification code has been sent to your email".to_string(),
            user_id: Some(user_id),
            pre_token: Some(pre_token),
            session: None,
        })
        .into_response(),
        LoginOutcome::Session(bundle) => {
            let session_response = SessionResponse::from(*bundle);
            let mut response_headers = HeaderMap::new();
            session::apply_session_cookies(&auth_state, &session_response, &mut response_headers);
            let body = LoginResponse {
                status: "ok".to_string(),
                message: "Login successful".to_string(),
                user_id: Some(session_response.user_id),
                pre_token: None,
                session: Some(session_response),
            };
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
    }
}
