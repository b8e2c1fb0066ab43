//! Telegram Bot API client.
//!
//! Sends HTML messages to the alert channel and long-polls for bot
//! commands. Auth: the bot token is part of the request path, so request
//! errors are stripped of their URL before they reach a log line.
//!
//! API docs: https://core.telegram.org/bots/api

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::Notifier;
use crate::commands::{CommandChannel, IncomingMessage};
use crate::types::DeliveryError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.telegram.org";

/// Upper bound on a single sendMessage call.
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra time on top of the long-poll window before a getUpdates call
/// is treated as hung.
const POLL_GRACE: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    #[serde(default)]
    username: Option<String>,
}

fn parse_username(body: &str) -> Result<Option<String>, DeliveryError> {
    let resp: ApiResponse<User> =
        serde_json::from_str(body).map_err(|e| DeliveryError::Rejected(e.to_string()))?;
    if !resp.ok {
        return Err(DeliveryError::Rejected(
            resp.description.unwrap_or_else(|| "getMe failed".to_string()),
        ));
    }
    Ok(resp.result.and_then(|u| u.username))
}

fn parse_updates(body: &str) -> Result<Vec<IncomingMessage>, DeliveryError> {
    let resp: ApiResponse<Vec<Update>> =
        serde_json::from_str(body).map_err(|e| DeliveryError::Rejected(e.to_string()))?;
    if !resp.ok {
        return Err(DeliveryError::Rejected(
            resp.description.unwrap_or_else(|| "getUpdates failed".to_string()),
        ));
    }
    Ok(resp
        .result
        .unwrap_or_default()
        .into_iter()
        .map(|u| {
            let (chat_id, text) = match u.message {
                Some(m) => (Some(m.chat.id), m.text),
                None => (None, None),
            };
            IncomingMessage {
                update_id: u.update_id,
                chat_id,
                text,
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TelegramClient {
    http: Client,
    token: SecretString,
    /// Alert destination: `@channel` or a numeric chat id.
    channel_id: String,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: SecretString, channel_id: String) -> Result<Self> {
        Self::with_base_url(BASE_URL, token, channel_id)
    }

    pub fn with_base_url(base_url: &str, token: SecretString, channel_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            token,
            channel_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }

    /// Send an HTML message to any chat.
    pub async fn send_to(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        let payload = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.without_url()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DeliveryError::Request(e.without_url()))?;

        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let api: ApiResponse<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| DeliveryError::Rejected(e.to_string()))?;
        if !api.ok {
            return Err(DeliveryError::Rejected(
                api.description.unwrap_or_else(|| "sendMessage failed".to_string()),
            ));
        }

        debug!(chat_id, chars = text.len(), "Telegram message sent");
        Ok(())
    }

    /// The bot's own `@username`, used to filter `/cmd@name` commands.
    pub async fn get_me(&self) -> Result<Option<String>, DeliveryError> {
        let resp = self
            .http
            .post(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.without_url()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DeliveryError::Request(e.without_url()))?;

        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_username(&body)
    }

    /// Long-poll for new messages. Blocks up to `timeout` server-side.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<IncomingMessage>, DeliveryError> {
        let payload = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ["message"],
        };

        let resp = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(timeout + POLL_GRACE)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.without_url()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DeliveryError::Request(e.without_url()))?;

        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_updates(&body)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, text: &str) -> Result<(), DeliveryError> {
        self.send_to(&self.channel_id, text).await
    }
}

#[async_trait]
impl CommandChannel for TelegramClient {
    async fn poll(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<IncomingMessage>, DeliveryError> {
        self.get_updates(offset, timeout).await
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.send_to(&chat_id.to_string(), text).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
