//! Incoming-webhook chat adapter

use async_trait::async_trait;
use relay_ports::{MessagingChannel, NotificationPayload, PortError, PortResult};
use reqwest::Url;
use tracing::debug;

use crate::client::{check_status, parse_base};

const SERVICE: &str = "slack";

/// Posts notifications to a chat incoming-webhook URL.
///
/// The webhook URL embeds its own credential, so it is never logged.
pub struct SlackWebhook {
    http: reqwest::Client,
    url: Url,
}

impl SlackWebhook {
    pub fn new(http: reqwest::Client, webhook_url: &str) -> PortResult<Self> {
        Ok(SlackWebhook {
            http,
            url: parse_base(SERVICE, webhook_url)?,
        })
    }
}

impl std::fmt::Debug for SlackWebhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebhook")
            .field("host", &self.url.host_str())
            .finish()
    }
}

#[async_trait]
impl MessagingChannel for SlackWebhook {
    async fn send(&self, payload: &NotificationPayload) -> PortResult<()> {
        debug!(
            host = self.url.host_str().unwrap_or_default(),
            attachments = payload.attachments.len(),
            "posting notification to webhook"
        );
        let response = self
            .http
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| PortError::transport(SERVICE, e.without_url()))?;
        check_status(SERVICE, response).await?;
        Ok(())
    }
}
