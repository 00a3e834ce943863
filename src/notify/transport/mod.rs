pub mod email;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppError;
use crate::models::notification::{Channel, MessageBody};

/// Result of a transport attempt. `Accepted` means the payload was handed to
/// a path whose response is unobservable; it is NOT confirmed-delivered, and
/// callers must not treat it as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Accepted,
}

impl SendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendOutcome::Delivered => "delivered",
            SendOutcome::Accepted => "accepted",
        }
    }
}

/// One external notification path. Implementations are swappable and fail
/// independently of each other.
#[async_trait]
pub trait Transport: Send + Sync {
    fn channel(&self) -> Channel;

    /// `Ok` means accepted for delivery, not confirmed-delivered.
    async fn send(&self, body: &MessageBody) -> Result<SendOutcome, AppError>;
}

pub fn transports_from_config(config: &Config) -> Vec<Arc<dyn Transport>> {
    let mut transports: Vec<Arc<dyn Transport>> = Vec::new();

    if config.chat.enabled {
        transports.push(Arc::new(webhook::WebhookClient::new(config.chat.clone())));
    }
    if config.email.enabled {
        transports.push(Arc::new(email::EmailClient::new(config.email.clone())));
    }

    transports
}
