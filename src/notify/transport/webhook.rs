use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::error::AppError;
use crate::models::notification::{Channel, MessageBody};
use crate::notify::transport::{SendOutcome, Transport};

/// Chat webhook client with a three-stage fallback chain: the same-origin
/// proxy, the alternate proxy path, then a direct fire-and-forget call to
/// the external webhook URL. The direct call's response is intentionally
/// unobservable, so it reports `Accepted` rather than `Delivered`.
pub struct WebhookClient {
    config: ChatConfig,
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(config: ChatConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    fn proxy_urls(&self) -> Vec<&str> {
        self.config
            .proxy_url
            .iter()
            .chain(self.config.proxy_fallback_url.iter())
            .map(String::as_str)
            .collect()
    }

    async fn post_observed(&self, url: &str, payload: &serde_json::Value) -> Result<(), AppError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|err| AppError::ChannelSend(format!("webhook post to {url} failed: {err}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ChannelSend(format!(
                "webhook proxy {url} returned {}",
                response.status()
            )))
        }
    }

    /// Issue the direct call without observing the response. Counts as
    /// accepted once the request is on the wire; this is the documented
    /// at-least-once, unconfirmed-delivery tradeoff of the chat channel.
    fn post_unobserved(&self, payload: serde_json::Value) -> Result<(), AppError> {
        let url: reqwest::Url = self
            .config
            .webhook_url
            .parse()
            .map_err(|err| AppError::ChannelSend(format!("invalid webhook url: {err}")))?;

        let request = self.client.post(url).json(&payload);
        tokio::spawn(async move {
            if let Err(err) = request.send().await {
                debug!(error = %err, "unobserved webhook send errored after handoff");
            }
        });

        Ok(())
    }
}

#[async_trait]
impl Transport for WebhookClient {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    async fn send(&self, body: &MessageBody) -> Result<SendOutcome, AppError> {
        let MessageBody::Chat { text, blocks } = body else {
            return Err(AppError::ChannelSend(
                "webhook transport received a non-chat payload".to_string(),
            ));
        };

        let payload = json!({
            "channel": self.config.channel_id,
            "text": text,
            "blocks": blocks,
        });

        for url in self.proxy_urls() {
            match self.post_observed(url, &payload).await {
                Ok(()) => return Ok(SendOutcome::Delivered),
                Err(err) => {
                    warn!(url, error = %err, "webhook proxy attempt failed, falling back");
                }
            }
        }

        if self.config.webhook_url.is_empty() {
            return Err(AppError::ChannelSend(
                "all webhook proxies failed and no direct webhook url is configured".to_string(),
            ));
        }

        self.post_unobserved(payload)?;
        Ok(SendOutcome::Accepted)
    }
}
