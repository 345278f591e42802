//! Forgot-password endpoints.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::state::AuthState;
use super::types::{
    ForgotPasswordRequest, ForgotPasswordRequestResponse, ForgotPasswordResetRequest,
    MessageResponse,
};
use super::utils::{normalize_email, valid_email};

const MIN_PASSWORD_LENGTH: usize = 8;

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password-request",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code sent if the account exists", body = ForgotPasswordRequestResponse),
        (status = 400, description = "Malformed request", body = String)
    ),
    tag = "auth"
)]
pub async fn forgot_password_request(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match auth_state
        .orchestrator()
        .forgot_password_request(&email)
        .await
    {
        // Unknown accounts receive the same body with a decoy pre-token.
        Ok(pre_token) => Json(ForgotPasswordRequestResponse {
            message: "If the account exists, a reset code has been sent".to_string(),
            pre_token,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password-reset",
    request_body = ForgotPasswordResetRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Code rejected", body = String)
    ),
    tag = "auth"
)]
pub async fn forgot_password_reset(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordResetRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.new_password.len() < MIN_PASSWORD_LENGTH {
        return (
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        )
            .into_response();
    }

    match auth_state
        .orchestrator()
        .forgot_password_reset(
            &email,
            request.otp.trim(),
            request.pre_token.trim(),
            &request.new_password,
        )
        .await
    {
        Ok(()) => Json(MessageResponse {
            message: "Password updated. Please log in again".to_string(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}
