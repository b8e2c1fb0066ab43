//! Notification channels.
//!
//! Defines the `Notifier` trait and the Telegram Bot API client.

pub mod telegram;

use async_trait::async_trait;

use crate::types::DeliveryError;

/// Sink for alert text, bound to a single destination.
///
/// Failures are reported, never retried by callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), DeliveryError>;
}
