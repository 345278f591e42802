//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::device::DeviceTrustStore;
use crate::auth::lockdown::LockdownManager;
use crate::auth::magic_link::MagicLinkService;
use crate::auth::otp::OtpEngine;
use crate::auth::tokens::SessionTokenManager;
use crate::auth::totp::TotpManager;
use crate::auth::Orchestrator;
use crate::directory::UserDirectory;
use crate::email::{EmailQueue, EmailSender};
use crate::store::Store;

const DEFAULT_ACCESS_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_MAGIC_LINK_ACCESS_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_OTP_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_TOTP_PENDING_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_MAGIC_LINK_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_TRUST_TTL_SECONDS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
const DEFAULT_TOTP_ISSUER: &str = "gatehouse";
const DEFAULT_EMAIL_QUEUE_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AuthConfig {
    frontend_base_url: String,
    jwt_secret: SecretString,
    access_ttl_seconds: u64,
    refresh_ttl_seconds: u64,
    magic_link_access_ttl_seconds: u64,
    otp_ttl_seconds: u64,
    totp_pending_ttl_seconds: u64,
    magic_link_ttl_seconds: u64,
    trust_ttl_seconds: u64,
    similarity_threshold: f64,
    totp_issuer: String,
    email_queue_capacity: usize,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String, jwt_secret: SecretString) -> Self {
        Self {
            frontend_base_url,
            jwt_secret,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            magic_link_access_ttl_seconds: DEFAULT_MAGIC_LINK_ACCESS_TTL_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            totp_pending_ttl_seconds: DEFAULT_TOTP_PENDING_TTL_SECONDS,
            magic_link_ttl_seconds: DEFAULT_MAGIC_LINK_TTL_SECONDS,
            trust_ttl_seconds: DEFAULT_TRUST_TTL_SECONDS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
            email_queue_capacity: DEFAULT_EMAIL_QUEUE_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: u64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: u64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_magic_link_access_ttl_seconds(mut self, seconds: u64) -> Self {
        self.magic_link_access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: u64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_totp_pending_ttl_seconds(mut self, seconds: u64) -> Self {
        self.totp_pending_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_magic_link_ttl_seconds(mut self, seconds: u64) -> Self {
        self.magic_link_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_trust_ttl_seconds(mut self, seconds: u64) -> Self {
        self.trust_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_email_queue_capacity(mut self, capacity: usize) -> Self {
        self.email_queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> u64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> u64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn magic_link_access_ttl_seconds(&self) -> u64 {
        self.magic_link_access_ttl_seconds
    }

    #[must_use]
    pub fn email_queue_capacity(&self) -> usize {
        self.email_queue_capacity
    }
}

/// Shared handler state: the configured orchestrator plus its config.
pub struct AuthState {
    config: AuthConfig,
    orchestrator: Orchestrator,
}

impl AuthState {
    /// Wire every auth component against the given store, directory and
    /// email sender.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn Store>,
        directory: Arc<dyn UserDirectory>,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        let trust = DeviceTrustStore::new(
            store.clone(),
            Duration::from_secs(config.trust_ttl_seconds),
        );
        let tokens = SessionTokenManager::new(
            store.clone(),
            config.jwt_secret.clone(),
            Duration::from_secs(config.access_ttl_seconds),
            Duration::from_secs(config.refresh_ttl_seconds),
        );
        let orchestrator = Orchestrator::new(
            directory,
            trust.clone(),
            OtpEngine::new(store.clone(), Duration::from_secs(config.otp_ttl_seconds)),
            TotpManager::new(
                store.clone(),
                config.totp_issuer.clone(),
                Duration::from_secs(config.totp_pending_ttl_seconds),
            ),
            MagicLinkService::new(
                store.clone(),
                &config.frontend_base_url,
                Duration::from_secs(config.magic_link_ttl_seconds),
                config.similarity_threshold,
            ),
            tokens.clone(),
            LockdownManager::new(store, trust, tokens),
            EmailQueue::spawn(sender, config.email_queue_capacity),
            Duration::from_secs(config.magic_link_access_ttl_seconds),
        );
        Self {
            config,
            orchestrator,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}
