//! Login orchestration.
//!
//! Composes the verifier, trust store, OTP/TOTP engines, magic-link service
//! and token manager into the method-selection and verification flow exposed
//! at the API boundary. The flow per login:
//! `Start -> MethodChosen -> {PasswordPending | MagicLinkSent |
//! TotpOrOtpPending} -> SecondFactorPending? -> SessionIssued | Rejected`.
//!
//! Callers can never distinguish "user not found" from "wrong password":
//! unknown accounts get the same generic check-your-account outcome as a
//! magic-link issuance, and every verification failure maps to the same
//! generic rejection.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::device::{DeviceTrustStore, TrustedDevice};
use crate::auth::error::AuthError;
use crate::auth::fingerprint::DeviceFingerprint;
use crate::auth::lockdown::LockdownManager;
use crate::auth::magic_link::MagicLinkService;
use crate::auth::otp::{OtpEngine, OtpPurpose};
use crate::auth::password;
use crate::auth::tokens::{SessionTokenManager, TokenPair};
use crate::auth::totp::TotpManager;
use crate::directory::{AuthMethod, Credential, UserDirectory};
use crate::email::{EmailMessage, EmailQueue};

/// A successfully issued session, plus the device record when the caller
/// asked for the device to be trusted.
#[derive(Clone, Debug)]
pub struct SessionBundle {
    pub user_id: Uuid,
    pub tokens: TokenPair,
    pub trusted_device: Option<TrustedDevice>,
}

/// Outcome of the first login step.
#[derive(Clone, Debug)]
pub enum LoginOutcome {
    /// Unknown account, or a magic link was sent; indistinguishable by
    /// design.
    CheckAccount,
    RequiresTotp {
        user_id: Uuid,
    },
    RequiresOtp {
        user_id: Uuid,
        pre_token: String,
    },
    Session(Box<SessionBundle>),
}

#[derive(Clone)]
pub struct Orchestrator {
    directory: Arc<dyn UserDirectory>,
    trust: DeviceTrustStore,
    otp: OtpEngine,
    totp: TotpManager,
    magic: MagicLinkService,
    tokens: SessionTokenManager,
    lockdown: LockdownManager,
    mailer: EmailQueue,
    magic_link_access_ttl: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        trust: DeviceTrustStore,
        otp: OtpEngine,
        totp: TotpManager,
        magic: MagicLinkService,
        tokens: SessionTokenManager,
        lockdown: LockdownManager,
        mailer: EmailQueue,
        magic_link_access_ttl: Duration,
    ) -> Self {
        Self {
            directory,
            trust,
            otp,
            totp,
            magic,
            tokens,
            lockdown,
            mailer,
            magic_link_access_ttl,
        }
    }

    #[must_use]
    pub fn trust(&self) -> &DeviceTrustStore {
        &self.trust
    }

    #[must_use]
    pub fn totp(&self) -> &TotpManager {
        &self.totp
    }

    #[must_use]
    pub fn tokens(&self) -> &SessionTokenManager {
        &self.tokens
    }

    #[must_use]
    pub fn lockdown(&self) -> &LockdownManager {
        &self.lockdown
    }

    async fn require_user(&self, user_id: Uuid) -> Result<Credential, AuthError> {
        let credential = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound("user"))?;
        if self.lockdown.is_locked(user_id).await? {
            return Err(AuthError::Locked);
        }
        Ok(credential)
    }

    /// First login step: resolve the account's configured method and either
    /// issue a session, demand a second factor, or kick off a magic link.
    ///
    /// # Errors
    /// `Locked` for a locked account, `Mismatch` on a bad password,
    /// `Validation` when the method needs a password and none was sent,
    /// `Dependency` on store/directory failure.
    pub async fn login(
        &self,
        email: &str,
        plaintext_password: Option<&str>,
        fingerprint: &DeviceFingerprint,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(credential) = self.directory.find_by_email(email).await? else {
            info!("login attempt for unknown account");
            return Ok(LoginOutcome::CheckAccount);
        };
        if self.lockdown.is_locked(credential.user_id).await? {
            return Err(AuthError::Locked);
        }

        match credential.method {
            AuthMethod::Password => {
                self.password_login(&credential, plaintext_password, fingerprint)
                    .await
            }
            AuthMethod::MagicLink => {
                let issued = self
                    .magic
                    .issue(credential.user_id, &credential.email, fingerprint)
                    .await?;
                self.mailer.enqueue(EmailMessage::magic_link(
                    &credential.email,
                    &credential.display_name,
                    &issued.redeem_url,
                ));
                Ok(LoginOutcome::CheckAccount)
            }
            // TOTP is required regardless of device trust; this path has no
            // email fallback.
            AuthMethod::Authenticator => Ok(LoginOutcome::RequiresTotp {
                user_id: credential.user_id,
            }),
        }
    }

    async fn password_login(
        &self,
        credential: &Credential,
        plaintext_password: Option<&str>,
        fingerprint: &DeviceFingerprint,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(plaintext) = plaintext_password else {
            return Err(AuthError::Validation("password is required".to_string()));
        };
        let Some(hash) = credential.password_hash.as_deref() else {
            warn!(user_id = %credential.user_id, "password login for account without a hash");
            return Err(AuthError::Mismatch("password"));
        };
        if !password::verify(plaintext, hash) {
            return Err(AuthError::Mismatch("password"));
        }

        let (trusted, device) = self.trust.is_trusted(credential.user_id, fingerprint).await?;

        if self.totp.is_enabled(credential.user_id).await? {
            return Ok(LoginOutcome::RequiresTotp {
                user_id: credential.user_id,
            });
        }
        if !trusted {
            let (code, pre_token) = self.otp.issue(OtpPurpose::Login, credential.user_id).await?;
            self.mailer.enqueue(EmailMessage::login_otp(
                &credential.email,
                &credential.display_name,
                &code,
            ));
            return Ok(LoginOutcome::RequiresOtp {
                user_id: credential.user_id,
                pre_token,
            });
        }

        let pair = self.tokens.issue_pair(credential.user_id).await?;
        Ok(LoginOutcome::Session(Box::new(SessionBundle {
            user_id: credential.user_id,
            tokens: pair,
            trusted_device: device,
        })))
    }

    /// Complete a login that was parked on an email OTP.
    ///
    /// # Errors
    /// `Expired`/`Mismatch` from OTP validation, `Locked`, `Dependency`.
    pub async fn verify_otp(
        &self,
        user_id: Uuid,
        code: &str,
        pre_token: &str,
        fingerprint: &DeviceFingerprint,
        trust_device: bool,
    ) -> Result<SessionBundle, AuthError> {
        let credential = self.require_user(user_id).await?;
        self.otp
            .validate(OtpPurpose::Login, user_id, code, pre_token)
            .await?;
        self.finish_session(&credential, fingerprint, trust_device, None)
            .await
    }

    /// Complete a login that was parked on a TOTP challenge. A parallel
    /// email OTP challenge, if any, is discarded.
    ///
    /// # Errors
    /// `Mismatch` on a wrong code, `Locked`, `Dependency`.
    pub async fn verify_totp(
        &self,
        user_id: Uuid,
        code: &str,
        fingerprint: &DeviceFingerprint,
        trust_device: bool,
    ) -> Result<SessionBundle, AuthError> {
        let credential = self.require_user(user_id).await?;
        if !self.totp.validate(user_id, code).await? {
            return Err(AuthError::Mismatch("totp code"));
        }
        self.otp.invalidate(OtpPurpose::Login, user_id).await?;
        self.finish_session(&credential, fingerprint, trust_device, None)
            .await
    }

    /// Redeem a magic link into a session. Magic-link sessions may carry a
    /// longer access-token lifetime than password logins.
    ///
    /// # Errors
    /// Everything `MagicLinkService::redeem` returns, plus `Locked`.
    pub async fn redeem_magic_link(
        &self,
        token: &str,
        fingerprint: &DeviceFingerprint,
        trust_device: bool,
    ) -> Result<(SessionBundle, String), AuthError> {
        let (ticket, redirect_url) = self.magic.redeem(token, fingerprint).await?;
        let credential = self.require_user(ticket.user_id).await?;
        let bundle = self
            .finish_session(
                &credential,
                fingerprint,
                trust_device,
                Some(self.magic_link_access_ttl),
            )
            .await?;
        Ok((bundle, redirect_url))
    }

    /// Start a password reset. Always produces a pre-token; for unknown
    /// accounts it is a decoy, so the response shape never leaks whether
    /// the address exists.
    ///
    /// # Errors
    /// Returns `Dependency` on store/directory failure.
    pub async fn forgot_password_request(&self, email: &str) -> Result<String, AuthError> {
        let Some(credential) = self.directory.find_by_email(email).await? else {
            info!("password reset requested for unknown account");
            let (_, decoy) = self.otp.issue(OtpPurpose::PasswordReset, Uuid::new_v4()).await?;
            return Ok(decoy);
        };
        let (code, pre_token) = self
            .otp
            .issue(OtpPurpose::PasswordReset, credential.user_id)
            .await?;
        self.mailer.enqueue(EmailMessage::password_reset_otp(
            &credential.email,
            &credential.display_name,
            &code,
        ));
        Ok(pre_token)
    }

    /// Finish a password reset: validate the OTP, store the new hash, and
    /// revoke every outstanding session.
    ///
    /// # Errors
    /// `Expired`/`Mismatch` from OTP validation, `Dependency` otherwise.
    pub async fn forgot_password_reset(
        &self,
        email: &str,
        code: &str,
        pre_token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let Some(credential) = self.directory.find_by_email(email).await? else {
            return Err(AuthError::Mismatch("password reset"));
        };
        self.otp
            .validate(OtpPurpose::PasswordReset, credential.user_id, code, pre_token)
            .await?;

        let hash = password::hash(new_password)?;
        self.directory
            .update_password_hash(credential.user_id, &hash)
            .await?;
        self.tokens.revoke_all_for_user(credential.user_id).await?;
        info!(user_id = %credential.user_id, "password reset completed");
        Ok(())
    }

    /// Start TOTP enrollment for an authenticated user. The account email
    /// labels the otpauth URI.
    ///
    /// # Errors
    /// `NotFound` for an unknown user, `Locked`, `Dependency`.
    pub async fn begin_totp_setup(
        &self,
        user_id: Uuid,
    ) -> Result<crate::auth::totp::TotpProvisioning, AuthError> {
        let credential = self.require_user(user_id).await?;
        self.totp.begin_enrollment(user_id, &credential.email).await
    }

    /// Confirm a pending TOTP enrollment with a first valid code.
    ///
    /// # Errors
    /// `NotFound` without a pending enrollment, `Mismatch` on a wrong code,
    /// `Locked`, `Dependency`.
    pub async fn enable_totp(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        self.require_user(user_id).await?;
        self.totp.confirm(user_id, code).await
    }

    /// Disable TOTP after re-verifying the account password.
    ///
    /// # Errors
    /// `Mismatch` when the password does not match, `Locked`, `Dependency`.
    pub async fn disable_totp(&self, user_id: Uuid, plaintext_password: &str) -> Result<(), AuthError> {
        let credential = self.require_user(user_id).await?;
        let Some(hash) = credential.password_hash.as_deref() else {
            return Err(AuthError::Mismatch("password"));
        };
        if !password::verify(plaintext_password, hash) {
            return Err(AuthError::Mismatch("password"));
        }
        self.totp.disable(user_id).await
    }

    async fn finish_session(
        &self,
        credential: &Credential,
        fingerprint: &DeviceFingerprint,
        trust_device: bool,
        access_ttl: Option<Duration>,
    ) -> Result<SessionBundle, AuthError> {
        let pair = match access_ttl {
            Some(ttl) => {
                self.tokens
                    .issue_pair_with_access_ttl(credential.user_id, ttl)
                    .await?
            }
            None => self.tokens.issue_pair(credential.user_id).await?,
        };

        let trusted_device = if trust_device {
            let device = self.trust.register(credential.user_id, fingerprint).await?;
            self.mailer.enqueue(EmailMessage::device_registered(
                &credential.email,
                &credential.display_name,
                &device.label,
            ));
            Some(device)
        } else {
            None
        };

        Ok(SessionBundle {
            user_id: credential.user_id,
            tokens: pair,
            trusted_device,
        })
    }
}
