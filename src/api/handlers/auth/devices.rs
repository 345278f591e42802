//! Trusted-device listing and revocation endpoints.

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
use super::types::{DeviceListResponse, DeviceResponse, RemoveDeviceRequest};

#[utoipa::path(
    get,
    path = "/v1/auth/devices",
    responses(
        (status = 200, description = "Caller's trusted devices", body = DeviceListResponse),
        (status = 401, description = "Not authenticated", body = String)
    ),
    tag = "auth"
)]
pub async fn list(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let user_id = match session::authenticate(&headers, &auth_state) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };
    device_list(&auth_state, user_id).await
}

/// Back-office view of another account's trusted devices.
#[utoipa::path(
    get,
    path = "/v1/auth/trusted-devices/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "Account to inspect")
    ),
    responses(
        (status = 200, description = "Trusted devices for the account", body = DeviceListResponse),
        (status = 401, description = "Not authenticated", body = String)
    ),
    tag = "auth"
)]
pub async fn list_for_user(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Path(user_id): Path<Uuid>,
) -> Response {
    if let Err(err) = session::authenticate(&headers, &auth_state) {
        return err.into_response();
    }
    device_list(&auth_state, user_id).await
}

#[utoipa::path(
    delete,
    path = "/v1/auth/devices",
    request_body = RemoveDeviceRequest,
    responses(
        (status = 204, description = "Device removed"),
        (status = 400, description = "Malformed request", body = String),
        (status = 401, description = "Not authenticated", body = String)
    ),
    tag = "auth"
)]
pub async fn remove(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RemoveDeviceRequest>>,
) -> Response {
    let user_id = match session::authenticate(&headers, &auth_state) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    if request.device_id.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing device id".to_string()).into_response();
    }

    match auth_state
        .orchestrator()
        .trust()
        .remove(user_id, request.device_id.trim())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn device_list(auth_state: &AuthState, user_id: Uuid) -> Response {
    match auth_state.orchestrator().trust().list(user_id).await {
        Ok(devices) => Json(DeviceListResponse {
            devices: devices.into_iter().map(DeviceResponse::from).collect(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}
