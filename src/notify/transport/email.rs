use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::EmailConfig;
use crate::error::AppError;
use crate::models::notification::{Channel, MessageBody};
use crate::notify::transport::{SendOutcome, Transport};

/// Transactional-email gateway client. A gateway error is treated exactly
/// like a webhook failure: the rendered message goes back to the channel's
/// retry queue.
pub struct EmailClient {
    config: EmailConfig,
    client: reqwest::Client,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }
}

#[async_trait]
impl Transport for EmailClient {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, body: &MessageBody) -> Result<SendOutcome, AppError> {
        let MessageBody::Email {
            to,
            subject,
            html,
            text,
        } = body
        else {
            return Err(AppError::ChannelSend(
                "email transport received a non-email payload".to_string(),
            ));
        };

        let payload = json!({
            "from": self.config.from_address,
            "to": [to],
            "subject": subject,
            "html": html,
            "text": text,
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AppError::ChannelSend(format!("email gateway unreachable: {err}")))?;

        if response.status().is_success() {
            Ok(SendOutcome::Delivered)
        } else {
            Err(AppError::ChannelSend(format!(
                "email gateway returned {}",
                response.status()
            )))
        }
    }
}
