use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tracing::info;

use orderline_core::config::NotificationsConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notifications are not configured: {0}")]
    NotConfigured(String),
    #[error("receipt template error: {0}")]
    Template(String),
}

/// Outbound text messages to callers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError> {
        info!(
            event_name = "notification.sms.logged",
            phone,
            chars = message.chars().count(),
            "notification delivery disabled, message logged"
        );
        Ok(())
    }
}

/// Posts messages to an SMS gateway as `{to, from, body}` with a bearer token.
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
    api_token: SecretString,
    sender: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, api_token: SecretString, sender: impl Into<String>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into(), api_token, sender: sender.into() }
    }

    pub fn from_config(config: &NotificationsConfig) -> Result<Self, NotifyError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| NotifyError::NotConfigured("notifications.endpoint".to_string()))?;
        let api_token = config
            .api_token
            .clone()
            .ok_or_else(|| NotifyError::NotConfigured("notifications.api_token".to_string()))?;
        Ok(Self::new(endpoint, api_token, config.sender.clone()))
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(self.api_token.expose_secret())
            .json(&json!({ "to": phone, "from": self.sender, "body": message }))
            .send()
            .await?
            .error_for_status()?;

        info!(event_name = "notification.sms.sent", phone, "notification delivered");
        Ok(())
    }
}

/// The HTTP notifier when notifications are enabled, otherwise the log notifier.
pub fn notifier_from_config(config: &NotificationsConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    if config.enabled {
        Ok(Arc::new(HttpNotifier::from_config(config)?))
    } else {
        Ok(Arc::new(LogNotifier))
    }
}
