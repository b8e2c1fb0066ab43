//! Command dispatch and the long-poll loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{Command, CommandChannel, IncomingMessage};
use crate::config::{resolve_feed_symbol, Settings, ZoneSource};
use crate::engine::scheduler::wait_for_shutdown;
use crate::engine::Clock;
use crate::messages;
use crate::notify::Notifier;

/// Server-side long-poll window for each update request.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed poll before trying again.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

pub struct CommandHandler {
    settings: Settings,
    zones: Arc<dyn ZoneSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    bot_username: Option<String>,
}

impl CommandHandler {
    pub fn new(
        settings: Settings,
        zones: Arc<dyn ZoneSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            zones,
            notifier,
            clock,
            bot_username: None,
        }
    }

    /// Only answer `/cmd@name` when `name` is this bot.
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Reply text for `command`, if it answers in the requesting chat.
    /// `/test` has no reply; it posts to the alert channel instead.
    pub async fn execute(&self, command: Command) -> Option<String> {
        match command {
            Command::Start => Some(messages::start_reply(self.settings.interval.as_secs())),
            Command::Test => {
                match self.notifier.notify(messages::TEST_SIGNAL).await {
                    Ok(()) => info!("Test signal sent"),
                    Err(e) => error!(error = %e, "Test signal delivery failed"),
                }
                None
            }
            Command::Status => {
                let zones = self.zones.load();
                Some(messages::status(
                    &self.settings,
                    &zones,
                    resolve_feed_symbol,
                    self.clock.now(),
                ))
            }
        }
    }

    /// Handle one inbound message, replying through `channel`.
    pub async fn handle(&self, channel: &dyn CommandChannel, msg: &IncomingMessage) {
        let (Some(chat_id), Some(text)) = (msg.chat_id, msg.text.as_deref()) else {
            return;
        };
        let Some(command) = Command::parse(text, self.bot_username.as_deref()) else {
            debug!(chat_id, "Ignoring non-command message");
            return;
        };

        info!(chat_id, command = ?command, "Command received");
        if let Some(reply) = self.execute(command).await {
            if let Err(e) = channel.reply(chat_id, &reply).await {
                error!(chat_id, error = %e, "Command reply failed");
            }
        }
    }
}

/// Skip updates queued while the bot was offline, retrying until it
/// succeeds. Returns the offset to continue from, or `Err(())` if
/// shutdown arrived first.
async fn drop_pending(
    channel: &dyn CommandChannel,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Option<i64>, ()> {
    loop {
        match channel.poll(Some(-1), Duration::ZERO).await {
            Ok(pending) => return Ok(pending.last().map(|m| m.update_id + 1)),
            Err(e) => {
                // Polling without an offset would replay stale /test commands.
                warn!(error = %e, "Could not drop pending updates, retrying");
                tokio::select! {
                    biased;
                    _ = wait_for_shutdown(shutdown) => return Err(()),
                    _ = tokio::time::sleep(POLL_BACKOFF) => {}
                }
            }
        }
    }
}

/// Long-poll `channel` and dispatch commands until shutdown.
pub async fn run_command_loop(
    channel: Arc<dyn CommandChannel>,
    handler: Arc<CommandHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Ok(mut offset) = drop_pending(channel.as_ref(), &mut shutdown).await else {
        info!("Command loop stopped before start");
        return;
    };
    info!("Command loop started");

    loop {
        let polled = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            polled = channel.poll(offset, POLL_TIMEOUT) => polled,
        };

        match polled {
            Ok(updates) => {
                for msg in &updates {
                    offset = Some(msg.update_id + 1);
                    handler.handle(channel.as_ref(), msg).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Command poll failed, backing off");
                tokio::select! {
                    biased;
                    _ = wait_for_shutdown(&mut shutdown) => break,
                    _ = tokio::time::sleep(POLL_BACKOFF) => {}
                }
            }
        }
    }

    info!("Command loop stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
