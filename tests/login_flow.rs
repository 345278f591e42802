//! End-to-end login flows wired through `AuthState`, against the in-memory
//! store and a static directory.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use gatehouse::api::{AuthConfig, AuthState};
use gatehouse::auth::error::AuthError;
use gatehouse::auth::fingerprint::DeviceFingerprint;
use gatehouse::auth::magic_link::{MagicLinkService, MagicLinkTicket};
use gatehouse::auth::LoginOutcome;
use gatehouse::directory::{AuthMethod, Credential, StaticDirectory};
use gatehouse::email::{EmailMessage, EmailSender};
use gatehouse::store::{MemoryStore, Store};

struct RecordingSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl EmailSender for RecordingSender {
    fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.sent.lock().expect("sent lock").push(message.clone());
        Ok(())
    }
}

fn fingerprint() -> DeviceFingerprint {
    DeviceFingerprint {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Chrome/121.0 Safari/537.36"
            .to_string(),
        screen_resolution: "2560x1440".to_string(),
        timezone: "America/Denver".to_string(),
        language: "en-US".to_string(),
        platform: "MacIntel".to_string(),
        cookie_enabled: true,
        plugins: "pdf,cast".to_string(),
        canvas_hash: "canvas-a".to_string(),
        webgl_hash: "webgl-a".to_string(),
        ..DeviceFingerprint::default()
    }
}

fn credential(method: AuthMethod, password: Option<&str>) -> Credential {
    Credential {
        user_id: Uuid::new_v4(),
        email: "inspector@example.com".to_string(),
        display_name: "Sam Inspector".to_string(),
        password_hash: password.map(|plaintext| {
            gatehouse::auth::password::hash(plaintext).expect("hash")
        }),
        method,
    }
}

fn auth_state(
    users: Vec<Credential>,
    store: Arc<dyn Store>,
) -> (Arc<AuthState>, Arc<Mutex<Vec<EmailMessage>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let config = AuthConfig::new(
        "https://portal.example.com".to_string(),
        SecretString::from("integration-secret".to_string()),
    );
    let state = AuthState::new(
        config,
        store,
        Arc::new(StaticDirectory::new(users)),
        Arc::new(RecordingSender { sent: sent.clone() }),
    );
    (Arc::new(state), sent)
}

fn totp_for(secret_base32: &str) -> TOTP {
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .expect("secret"),
        Some("gatehouse".to_string()),
        "inspector@example.com".to_string(),
    )
    .expect("totp")
}

async fn wait_for_email(
    sent: &Arc<Mutex<Vec<EmailMessage>>>,
    template: &str,
) -> EmailMessage {
    for _ in 0..200 {
        if let Some(message) = sent
            .lock()
            .expect("sent lock")
            .iter()
            .find(|message| message.template == template)
            .cloned()
        {
            return message;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no {template} email delivered");
}

fn payload_field(message: &EmailMessage, field: &str) -> String {
    let payload: serde_json::Value =
        serde_json::from_str(&message.payload_json).expect("payload json");
    payload[field].as_str().expect("field").to_string()
}

#[tokio::test]
async fn authenticator_user_on_untrusted_device_requires_totp() {
    let user = credential(AuthMethod::Authenticator, Some("hunter2!pass"));
    let user_id = user.user_id;
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (state, _sent) = auth_state(vec![user], store);
    let fp = fingerprint();

    // Enroll the authenticator first.
    let provisioning = state
        .orchestrator()
        .begin_totp_setup(user_id)
        .await
        .expect("setup");
    let totp = totp_for(&provisioning.secret_base32);
    state
        .orchestrator()
        .enable_totp(user_id, &totp.generate_current().expect("code"))
        .await
        .expect("enable");

    let outcome = state
        .orchestrator()
        .login("inspector@example.com", Some("hunter2!pass"), &fp)
        .await
        .expect("login");
    assert!(matches!(outcome, LoginOutcome::RequiresTotp { user_id: uid } if uid == user_id));

    // Correct code issues a session; trust_device creates a TrustedDevice.
    let bundle = state
        .orchestrator()
        .verify_totp(user_id, &totp.generate_current().expect("code"), &fp, true)
        .await
        .expect("verify");
    assert_eq!(bundle.user_id, user_id);
    let device = bundle.trusted_device.expect("device");
    assert!(device.active);

    // Trust never bypasses the authenticator requirement.
    let outcome = state
        .orchestrator()
        .login("inspector@example.com", Some("hunter2!pass"), &fp)
        .await
        .expect("second login");
    assert!(matches!(outcome, LoginOutcome::RequiresTotp { .. }));
}

#[tokio::test]
async fn lockdown_sweeps_devices_and_blocks_login() {
    let user = credential(AuthMethod::Password, Some("hunter2!pass"));
    let user_id = user.user_id;
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (state, sent) = auth_state(vec![user], store);
    let fp = fingerprint();

    let outcome = state
        .orchestrator()
        .login("inspector@example.com", Some("hunter2!pass"), &fp)
        .await
        .expect("login");
    let LoginOutcome::RequiresOtp { pre_token, .. } = outcome else {
        panic!("expected otp challenge");
    };
    let code = payload_field(&wait_for_email(&sent, "login_otp").await, "code");
    state
        .orchestrator()
        .verify_otp(user_id, &code, &pre_token, &fp, true)
        .await
        .expect("verify");

    let (trusted, _) = state
        .orchestrator()
        .trust()
        .is_trusted(user_id, &fp)
        .await
        .expect("trust check");
    assert!(trusted);

    state
        .orchestrator()
        .lockdown()
        .lock(user_id, "reported stolen laptop")
        .await
        .expect("lock");

    // A previously trusted device now reports locked, and the list is empty.
    let result = state.orchestrator().trust().is_trusted(user_id, &fp).await;
    assert!(matches!(result, Err(AuthError::Locked)));
    let devices = state
        .orchestrator()
        .trust()
        .list(user_id)
        .await
        .expect("list");
    assert!(devices.is_empty());

    let result = state
        .orchestrator()
        .login("inspector@example.com", Some("hunter2!pass"), &fp)
        .await;
    assert!(matches!(result, Err(AuthError::Locked)));
}

#[tokio::test]
async fn expired_magic_link_is_rejected() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let service = MagicLinkService::new(
        Arc::clone(&store),
        "https://portal.example.com",
        Duration::from_secs(900),
        0.7,
    );
    let fp = fingerprint();
    let now = chrono::Utc::now();

    // A ticket whose deadline has already passed but whose backing record
    // is still present in the store.
    let ticket = MagicLinkTicket {
        token: "stale-token".to_string(),
        user_id: Uuid::new_v4(),
        email: "inspector@example.com".to_string(),
        fingerprint: fp.clone(),
        created_at: now - chrono::Duration::seconds(120),
        expires_at: now - chrono::Duration::seconds(30),
        used: false,
    };
    let payload = serde_json::to_string(&ticket).expect("serialize ticket");
    store
        .set(
            "magic_link:stale-token",
            &payload,
            Some(Duration::from_secs(60)),
        )
        .await
        .expect("seed ticket");

    let result = service.redeem("stale-token", &fp).await;
    assert!(matches!(result, Err(AuthError::Expired(_))));

    // The expired ticket is deleted on the failed redemption.
    let remaining = store.get("magic_link:stale-token").await.expect("get");
    assert!(remaining.is_none());
}

#[tokio::test]
async fn magic_link_accepts_similar_device_and_rejects_replay() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let service = MagicLinkService::new(
        store,
        "https://portal.example.com",
        Duration::from_secs(900),
        0.7,
    );
    let issued_on = fingerprint();
    let user_id = Uuid::new_v4();

    let issued = service
        .issue(user_id, "inspector@example.com", &issued_on)
        .await
        .expect("issue");

    // 8/9 attributes still match after a plugin change.
    let mut redeemed_on = fingerprint();
    redeemed_on.plugins = "pdf".to_string();

    let (ticket, redirect_url) = service
        .redeem(&issued.token, &redeemed_on)
        .await
        .expect("redeem");
    assert_eq!(ticket.user_id, user_id);
    assert!(ticket.used);
    assert_eq!(redirect_url, "https://portal.example.com/dashboard");

    let result = service.redeem(&issued.token, &redeemed_on).await;
    assert!(matches!(result, Err(AuthError::AlreadyUsed(_))));
}
