//! TOTP enrollment endpoints.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::session;
use super::state::AuthState;
use super::types::{MessageResponse, TotpDisableRequest, TotpEnableRequest, TotpSetupResponse, TotpStatusResponse};

#[utoipa::path(
    post,
    path = "/v1/auth/totp/setup",
    responses(
        (status = 200, description = "Enrollment started", body = TotpSetupResponse),
        (status = 401, description = "Not authenticated", body = String)
    ),
    tag = "auth"
)]
pub async fn setup(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let user_id = match session::authenticate(&headers, &auth_state) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };

    match auth_state.orchestrator().begin_totp_setup(user_id).await {
        Ok(provisioning) => Json(TotpSetupResponse {
            secret: provisioning.secret_base32,
            provisioning_uri: provisioning.provisioning_uri,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/totp/enable",
    request_body = TotpEnableRequest,
    responses(
        (status = 200, description = "Enrollment confirmed", body = MessageResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Code rejected", body = String)
    ),
    tag = "auth"
)]
pub async fn enable(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TotpEnableRequest>>,
) -> Response {
    let user_id = match session::authenticate(&headers, &auth_state) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match auth_state
        .orchestrator()
        .enable_totp(user_id, request.code.trim())
        .await
    {
        Ok(()) => Json(MessageResponse {
            message: "Authenticator enabled".to_string(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/totp/disable",
    request_body = TotpDisableRequest,
    responses(
        (status = 200, description = "Authenticator disabled", body = MessageResponse),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Password rejected", body = String)
    ),
    tag = "auth"
)]
pub async fn disable(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TotpDisableRequest>>,
) -> Response {
    let user_id = match session::authenticate(&headers, &auth_state) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match auth_state
        .orchestrator()
        .disable_totp(user_id, &request.password)
        .await
    {
        Ok(()) => Json(MessageResponse {
            message: "Authenticator disabled".to_string(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/totp/status/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "Account to query")
    ),
    responses(
        (status = 200, description = "Enrollment status", body = TotpStatusResponse),
        (status = 401, description = "Not authenticated", body = String)
    ),
    tag = "auth"
)]
pub async fn status(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Path(user_id): Path<Uuid>,
) -> Response {
    if let Err(err) = session::authenticate(&headers, &auth_state) {
        return err.into_response();
    }

    match auth_state.orchestrator().totp().is_enabled(user_id).await {
        Ok(enabled) => Json(TotpStatusResponse { enabled }).into_response(),
        Err(err) => err.into_response(),
    }
}
