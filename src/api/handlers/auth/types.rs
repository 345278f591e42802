//! Request/response types for auth endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::device::TrustedDevice;
use crate::auth::fingerprint::DeviceFingerprint;
use crate::auth::SessionBundle;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: Option<String>,
    #[serde(default)]
    pub device_fingerprint: DeviceFingerprint,
}

/// Discriminated login outcome. `status` is one of `check_account`,
/// `totp_required`, `otp_required` or `ok`; the optional fields are filled
/// according to the status.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionResponse>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_device: Option<DeviceResponse>,
}

impl From<SessionBundle> for SessionResponse {
    fn from(bundle: SessionBundle) -> Self {
        Self {
            user_id: bundle.user_id,
            access_token: bundle.tokens.access_token,
            refresh_token: bundle.tokens.refresh_token,
            access_expires_at: bundle.tokens.access_expires_at,
            refresh_expires_at: bundle.tokens.refresh_expires_at,
            trusted_device: bundle.trusted_device.map(DeviceResponse::from),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub user_id: Uuid,
    pub otp: String,
    pub pre_token: String,
    #[serde(default)]
    pub device_fingerprint: DeviceFingerprint,
    #[serde(default)]
    pub trust_device: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyTotpRequest {
    pub user_id: Uuid,
    pub totp_code: String,
    #[serde(default)]
    pub device_fingerprint: DeviceFingerprint,
    #[serde(default)]
    pub trust_device: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MagicLinkVerifyRequest {
    pub token: String,
    #[serde(default)]
    pub device_fingerprint: DeviceFingerprint,
    #[serde(default)]
    pub trust_device: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MagicLinkVerifyResponse {
    pub session: SessionResponse,
    pub redirect_url: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TotpSetupResponse {
    pub secret: String,
    pub provisioning_uri: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TotpEnableRequest {
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TotpDisableRequest {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TotpStatusResponse {
    pub enabled: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequestResponse {
    pub message: String,
    pub pre_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordResetRequest {
    pub email: String,
    pub otp: String,
    pub pre_token: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct DeviceResponse {
    pub device_id: String,
    pub label: String,
    pub registered_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub active: bool,
}

impl From<TrustedDevice> for DeviceResponse {
    fn from(device: TrustedDevice) -> Self {
        Self {
            device_id: device.device_id,
            label: device.label,
            registered_at: device.registered_at,
            last_used_at: device.last_used_at,
            active: device.active,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceResponse>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RemoveDeviceRequest {
    pub device_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_defaults_fingerprint() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email":"clerk@example.com"}"#).expect("decode");
        assert_eq!(request.email, "clerk@example.com");
        assert!(request.password.is_none());
        assert_eq!(request.device_fingerprint, DeviceFingerprint::default());
    }

    #[test]
    fn login_response_omits_empty_fields() {
        let response = LoginResponse {
            status: "check_account".to_string(),
            message: "Please check your account".to_string(),
            user_id: None,
            pre_token: None,
            session: None,
        };
        let value = serde_json::to_value(&response).expect("encode");
        assert!(value.get("user_id").is_none());
        assert!(value.get("session").is_none());
    }

    #[test]
    fn verify_otp_request_trust_defaults_off() {
        let request: VerifyOtpRequest = serde_json::from_str(
            r#"{"user_id":"7f2c3a9e-6a1f-4bd3-9a6e-2f8d2f6f0a11","otp":"123456","pre_token":"p"}"#,
        )
        .expect("decode");
        assert!(!request.trust_device);
    }
}
