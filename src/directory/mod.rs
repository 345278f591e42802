//! User directory client.
//!
//! Credentials (user id, email, password hash, preferred auth method) are
//! owned by the external user service; this service only reads them, plus a
//! single write used by password reset. The HTTP implementation talks to the
//! back-office user API; tests use the static implementation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Login method configured on the account.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Password,
    MagicLink,
    Authenticator,
}

impl AuthMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::MagicLink => "magic_link",
            Self::Authenticator => "authenticator",
        }
    }
}

/// Read-only view of an account, as served by the user service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: Option<String>,
    pub method: AuthMethod,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Credential>>;

    /// Replace the stored password hash after a completed reset. The hash is
    /// computed here; the user service never sees the plaintext.
    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()>;
}

/// HTTP client for the back-office user service.
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("failed to build user directory client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, url: String) -> Result<Option<Credential>> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("user directory request failed")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!(
                "user directory returned status {}",
                response.status()
            ));
        }
        let credential = response
            .json::<Credential>()
            .await
            .context("failed to decode user directory response")?;
        Ok(Some(credential))
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>> {
        let url = format!("{}/internal/users/by-email/{email}", self.base_url);
        self.fetch(url).await
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Credential>> {
        let url = format!("{}/internal/users/{user_id}", self.base_url);
        self.fetch(url).await
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let url = format!("{}/internal/users/{user_id}/password-hash", self.base_url);
        let mut body = HashMap::new();
        body.insert("password_hash", password_hash);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("password hash update request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "user directory rejected password update with status {}",
                response.status()
            ));
        }
        Ok(())
    }
}

/// Fixed set of accounts, for tests and local development.
#[derive(Default)]
pub struct StaticDirectory {
    users: Mutex<Vec<Credential>>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new(users: Vec<Credential>) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>> {
        let users = self.users.lock().expect("directory lock");
        Ok(users.iter().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Credential>> {
        let users = self.users.lock().expect("directory lock");
        Ok(users.iter().find(|user| user.user_id == user_id).cloned())
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let mut users = self.users.lock().expect("directory lock");
        let user = users
            .iter_mut()
            .find(|user| user.user_id == user_id)
            .ok_or_else(|| anyhow!("unknown user {user_id}"))?;
        user.password_hash = Some(password_hash.to_string());
        Ok(())
    }
}
