use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde_json::json;

use crate::errors::{Result, SyncError};

#[async_trait]
pub trait Notifier {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Post a plain text message to a chat webhook as `{"text": message}`.
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> WebhookNotifier {
        WebhookNotifier {
            url,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        if self.url.is_empty() {
            warn!("no webhook configured, message not sent: {}", message);
            return Ok(());
        }
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(json!({ "text": message }).to_string())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::HttpStatus {
                url: self.url.clone(),
                status: response.status(),
            });
        }
        info!("notification sent");
        Ok(())
    }
}
