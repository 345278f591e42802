//! Outbound email delivery.
//!
//! Transport is an external concern; this module only defines the delivery
//! seam and a bounded background queue. Callers enqueue and move on, but a
//! failed or dropped message is always logged, never silently lost.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

impl EmailMessage {
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn new(to_email: &str, template: &str, payload: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            to_email: to_email.to_string(),
            template: template.to_string(),
            payload_json: serde_json::to_string(payload)?,
        })
    }

    #[must_use]
    pub fn login_otp(to_email: &str, display_name: &str, code: &str) -> Self {
        Self {
            to_email: to_email.to_string(),
            template: "login_otp".to_string(),
            payload_json: json!({ "display_name": display_name, "code": code }).to_string(),
        }
    }

    #[must_use]
    pub fn password_reset_otp(to_email: &str, display_name: &str, code: &str) -> Self {
        Self {
            to_email: to_email.to_string(),
            template: "password_reset_otp".to_string(),
            payload_json: json!({ "display_name": display_name, "code": code }).to_string(),
        }
    }

    #[must_use]
    pub fn magic_link(to_email: &str, display_name: &str, redeem_url: &str) -> Self {
        Self {
            to_email: to_email.to_string(),
            template: "magic_link".to_string(),
            payload_json: json!({ "display_name": display_name, "redeem_url": redeem_url })
                .to_string(),
        }
    }

    #[must_use]
    pub fn device_registered(to_email: &str, display_name: &str, device_label: &str) -> Self {
        Self {
            to_email: to_email.to_string(),
            template: "device_registered".to_string(),
            payload_json: json!({ "display_name": display_name, "device_label": device_label })
                .to_string(),
        }
    }
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to have it logged as failed.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

/// Handle to the bounded delivery queue.
#[derive(Clone)]
pub struct EmailQueue {
    tx: mpsc::Sender<EmailMessage>,
}

impl EmailQueue {
    /// Spawn the delivery worker and return the submission handle.
    #[must_use]
    pub fn spawn(sender: Arc<dyn EmailSender>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<EmailMessage>(capacity);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(err) = sender.send(&message) {
                    error!(
                        to_email = %message.to_email,
                        template = %message.template,
                        error = %err,
                        "email delivery failed"
                    );
                }
            }
        });
        Self { tx }
    }

    /// Submit without waiting. A full queue drops the message with an error
    /// log; auth flows never block on email delivery.
    pub fn enqueue(&self, message: EmailMessage) {
        if let Err(err) = self.tx.try_send(message) {
            match &err {
                mpsc::error::TrySendError::Full(message) => {
                    error!(
                        to_email = %message.to_email,
                        template = %message.template,
                        "email queue full, message dropped"
                    );
                }
                mpsc::error::TrySendError::Closed(message) => {
                    error!(
                        to_email = %message.to_email,
                        template = %message.template,
                        "email worker gone, message dropped"
                    );
                }
            }
        }
    }
}
