use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::app::ports::NotifierPort;
use crate::error::{EtlError, Result};

#[derive(Debug, Serialize)]
struct Notification<'a> {
    topic: &'a str,
    message: &'a str,
}

/// Posts `{"topic": ..., "message": ...}` to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl NotifierPort for WebhookNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&Notification { topic, message })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(EtlError::Notification {
                message: format!("Notification webhook returned {}", response.status()),
            });
        }
        info!("Published notification to topic {}", topic);
        Ok(())
    }
}

/// Writes the notification to the log only
pub struct LogNotifier;

#[async_trait]
impl NotifierPort for LogNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        info!(topic = %topic, "Notification: {}", message);
        Ok(())
    }
}
