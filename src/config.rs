use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub notify_queue_size: usize,
    pub event_buffer_size: usize,
    pub notify_max_retries: u32,
    pub notify_drain_interval_ms: u64,
    pub sim_tick_ms: u64,
    pub sim_step_fraction: f64,
    pub chat: ChatConfig,
    pub email: EmailConfig,
}

/// Chat webhook channel. The proxy URLs are tried first; the webhook URL is
/// the direct, fire-and-forget fallback.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub enabled: bool,
    pub webhook_url: String,
    pub proxy_url: Option<String>,
    pub proxy_fallback_url: Option<String>,
    pub channel_id: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
    pub admin_to: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            notify_queue_size: parse_or_default("NOTIFY_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            notify_max_retries: parse_or_default("NOTIFY_MAX_RETRIES", 3)?,
            notify_drain_interval_ms: parse_or_default("NOTIFY_DRAIN_INTERVAL_MS", 5_000)?,
            sim_tick_ms: parse_or_default("SIM_TICK_MS", 1_500)?,
            sim_step_fraction: parse_or_default("SIM_STEP_FRACTION", 0.1)?,
            chat: ChatConfig {
                enabled: parse_or_default("CHAT_ENABLED", true)?,
                webhook_url: env::var("CHAT_WEBHOOK_URL").unwrap_or_default(),
                proxy_url: env::var("CHAT_PROXY_URL").ok(),
                proxy_fallback_url: env::var("CHAT_PROXY_FALLBACK_URL").ok(),
                channel_id: env::var("CHAT_CHANNEL_ID").unwrap_or_else(|_| "dispatch".to_string()),
            },
            email: EmailConfig {
                enabled: parse_or_default("EMAIL_ENABLED", true)?,
                api_url: env::var("EMAIL_API_URL")
                    .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
                api_key: env::var("EMAIL_API_KEY").unwrap_or_default(),
                from_address: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "dispatch@medirush.example".to_string()),
                admin_to: env::var("EMAIL_ADMIN_TO")
                    .unwrap_or_else(|_| "ops@medirush.example".to_string()),
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
