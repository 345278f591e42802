//! Magic-link redemption endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::session;
use super::state::AuthState;
use super::types::{MagicLinkVerifyRequest, MagicLinkVerifyResponse, SessionResponse};
use super::utils::extract_client_ip;

#[utoipa::path(
    post,
    path = "/v1/auth/magiclink/verify",
    request_body = MagicLinkVerifyRequest,
    responses(
        (status = 200, description = "Session issued", body = MagicLinkVerifyResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Link invalid, expired, or already used", body = String)
    ),
    tag = "auth"
)]
pub async fn verify(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<MagicLinkVerifyRequest>>,
) -> Response {
    let Some(Json(mut request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    if request.token.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }
    if request.device_fingerprint.ip_address.is_none() {
        request.device_fingerprint.ip_address = extract_client_ip(&headers);
    }

    match auth_state
        .orchestrator()
        .redeem_magic_link(
            request.token.trim(),
            &request.device_fingerprint,
            request.trust_device,
        )
        .await
    {
        Ok((bundle, redirect_url)) => {
            let session_body = SessionResponse::from(bundle);
            let mut response_headers = HeaderMap::new();
            session::apply_session_cookies(&auth_state, &session_body, &mut response_headers);
            let body = MagicLinkVerifyResponse {
                session: session_body,
                redirect_url,
            };
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
