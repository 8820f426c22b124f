use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use trainhub_core::domain::notification::EmailMessage;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail webhook request failed: {0}")]
    Request(String),
    #[error("mail webhook returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError>;
}

/// Posts messages to an HTTP relay that performs the actual SMTP delivery.
pub struct WebhookMailer {
    client: reqwest::Client,
    webhook_url: String,
    api_key: Option<SecretString>,
    sender: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    to: &'a str,
    to_name: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl WebhookMailer {
    pub fn new(webhook_url: String, api_key: Option<SecretString>, sender: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, webhook_url, api_key, sender }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        let payload = WebhookPayload {
            from: &self.sender,
            to: &message.recipient_email,
            to_name: &message.recipient_name,
            subject: &message.subject,
            body: &message.body,
        };

        let mut request = self.client.post(&self.webhook_url).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|err| MailerError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(MailerError::Status(response.status().as_u16()));
        }

        debug!(recipient = %message.recipient_email, subject = %message.subject, "email relayed");
        Ok(())
    }
}

/// Used when email is disabled in config.
#[derive(Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        debug!(recipient = %message.recipient_email, "email delivery disabled, dropping message");
        Ok(())
    }
}

/// Captures sent messages so tests can assert on the fan-out.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn fail_next_sends(&self, fail: bool) {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = fail;
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        let should_fail = self.fail.lock().map(|flag| *flag).unwrap_or(false);
        if should_fail {
            return Err(MailerError::Request("simulated relay outage".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}
