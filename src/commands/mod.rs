//! Bot command surface.
//!
//! Human-triggered `/start`, `/test` and `/status` requests. Commands
//! read the zone source and settings; they never touch the cooldown
//! registry.

pub mod handler;

use async_trait::async_trait;
use std::time::Duration;

use crate::types::DeliveryError;

/// One inbound update as seen by the command loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub update_id: i64,
    /// Absent for update types other than plain messages.
    pub chat_id: Option<i64>,
    pub text: Option<String>,
}

/// Transport that delivers command messages and carries replies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Fetch updates with id ≥ `offset`, waiting up to `timeout`.
    async fn poll(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<IncomingMessage>, DeliveryError>;

    /// Reply in the chat a command came from.
    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Test,
    Status,
}

impl Command {
    /// Parse `/start`, `/test`, `/status`, with an optional `@botname`
    /// suffix and trailing arguments. Anything else is `None`.
    ///
    /// With `bot_username` known, a suffix naming another bot is `None`
    /// so group chats with several bots only get answers from the one
    /// addressed. Without it, any suffix is accepted.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        let (name, target) = match word.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (word, None),
        };
        if let (Some(target), Some(own)) = (target, bot_username) {
            if !target.eq_ignore_ascii_case(own.trim_start_matches('@')) {
                return None;
            }
        }
        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "test" => Some(Command::Test),
            "status" => Some(Command::Status),
            _ => None,
        }
    }
}
