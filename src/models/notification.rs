use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::request::{DeliveryRequest, DeliveryStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    NewRequest,
    StatusUpdate,
}

/// Transient value object handed to the dispatcher. Never persisted as-is;
/// a failed channel attempt materializes it into a [`QueuedMessage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub request: DeliveryRequest,
    pub status: Option<DeliveryStatus>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Webhook,
    Email,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Webhook => write!(f, "webhook"),
            Channel::Email => write!(f, "email"),
        }
    }
}

/// Channel-specific payload produced by the render layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageBody {
    Chat {
        text: String,
        blocks: Option<serde_json::Value>,
    },
    Email {
        to: String,
        subject: String,
        html: String,
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub channel: Channel,
    pub body: MessageBody,
}

/// A rendered message parked on a channel's retry queue after a failed send.
/// `attempts` counts sends already made and never exceeds the retry limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub message: RenderedMessage,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}
