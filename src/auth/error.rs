//! Typed error taxonomy for the auth domain.
//!
//! Client-facing bodies stay generic so responses cannot be used as an
//! account-enumeration or fingerprinting oracle; the specific variant is
//! logged server-side only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed request: {0}")]
    Validation(String),
    #[error("record not found: {0}")]
    NotFound(&'static str),
    #[error("artifact expired: {0}")]
    Expired(&'static str),
    #[error("single-use artifact replayed: {0}")]
    AlreadyUsed(&'static str),
    #[error("verification mismatch: {0}")]
    Mismatch(&'static str),
    #[error("account is locked down")]
    Locked,
    #[error("ephemeral store unavailable")]
    Dependency(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(detail) => {
                tracing::warn!(detail, "rejected malformed auth request");
                (StatusCode::BAD_REQUEST, "Invalid request")
            }
            Self::NotFound(_) | Self::Mismatch(_) | Self::Locked => {
                tracing::warn!(error = %self, "auth attempt rejected");
                (StatusCode::UNAUTHORIZED, "Unauthorized")
            }
            Self::Expired(_) | Self::AlreadyUsed(_) => {
                tracing::warn!(error = %self, "auth attempt rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "Session invalid. Please log in again.",
                )
            }
            Self::Dependency(err) => {
                tracing::error!(error = ?err, "auth dependency failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service unavailable. Please try again later.",
                )
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_facing_status_codes() {
        let cases = [
            (
                AuthError::Validation("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (AuthError::NotFound("user"), StatusCode::UNAUTHORIZED),
            (AuthError::Expired("otp"), StatusCode::UNAUTHORIZED),
            (AuthError::AlreadyUsed("ticket"), StatusCode::UNAUTHORIZED),
            (AuthError::Mismatch("fingerprint"), StatusCode::UNAUTHORIZED),
            (AuthError::Locked, StatusCode::UNAUTHORIZED),
            (
                AuthError::Dependency(anyhow::anyhow!("redis down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn display_never_echoes_secrets() {
        let error = AuthError::Mismatch("refresh token owner");
        assert_eq!(
            error.to_string(),
            "verification mismatch: refresh token owner"
        );
    }
}
