//! Outbound message text.
//!
//! All messages are Telegram HTML. Anything taken from configuration
//! (pair, feed symbol, channel id) goes through [`escape_html`].

use chrono::{DateTime, Utc};

use crate::config::Settings;
use crate::types::ZoneDefinition;

/// Escape the three characters Telegram's HTML parser treats as markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// `2026-10-17 08:30:00 UTC`
pub fn utc_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// ---------------------------------------------------------------------------
// Zone events
// ---------------------------------------------------------------------------

pub fn enter(zone: &ZoneDefinition, price: f64) -> String {
    format!(
        "⚠️ <b>{}</b> price <b>{price}</b> entered <b>{} ZONE</b> ({}–{})\n\
         SL: <code>{}</code> | TP: <code>{}</code>",
        escape_html(&zone.pair),
        zone.side,
        zone.zone_low,
        zone.zone_high,
        zone.stop_loss,
        zone.take_profit_list(),
    )
}

pub fn exit(zone: &ZoneDefinition, price: f64) -> String {
    format!(
        "ℹ️ <b>{}</b> price {price} left the zone ({}–{}).",
        escape_html(&zone.pair),
        zone.zone_low,
        zone.zone_high,
    )
}

pub fn stop_loss(zone: &ZoneDefinition, price: f64) -> String {
    format!(
        "🟥 <b>{}</b> SL HIT at <b>{price}</b> (SL: {})",
        escape_html(&zone.pair),
        zone.stop_loss,
    )
}

/// `index` is 1-based.
pub fn take_profit(zone: &ZoneDefinition, price: f64, index: usize, target: f64) -> String {
    format!(
        "🟩 <b>{}</b> TP{index} HIT at <b>{price}</b> (TP{index}: {target})",
        escape_html(&zone.pair),
    )
}

// ---------------------------------------------------------------------------
// Scheduler and command replies
// ---------------------------------------------------------------------------

pub fn heartbeat(now: DateTime<Utc>, interval_secs: u64) -> String {
    format!(
        "✅ Bot running… {} (interval {interval_secs}s)",
        utc_timestamp(now)
    )
}

pub const TEST_SIGNAL: &str = "🔔 TEST SIGNAL 🔔\nThis is a test message from the bot.";

pub fn start_reply(interval_secs: u64) -> String {
    format!(
        "ZONEWATCH bot is alive ✅\n\
         Commands: /test, /status\n\
         Scanning zones every {interval_secs}s and alerting the channel."
    )
}

/// Render the `/status` reply for a zone snapshot.
///
/// Zones without an explicit or derivable feed symbol show `?`.
pub fn status(
    settings: &Settings,
    zones: &[ZoneDefinition],
    resolve_symbol: impl Fn(&ZoneDefinition) -> Option<String>,
    now: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "⚙️ <b>Status</b>".to_string(),
        format!("Time: {}", utc_timestamp(now)),
        format!(
            "Interval: {}s  |  Cooldown: {}s",
            settings.interval.as_secs(),
            settings.cooldown.as_secs()
        ),
        format!("Channel: <code>{}</code>", escape_html(&settings.channel_id)),
        format!("Zones: {}", zones.len()),
    ];

    for (i, zone) in zones.iter().enumerate() {
        let feed = resolve_symbol(zone).unwrap_or_else(|| "?".to_string());
        lines.push(format!(
            "\n<b>{}. {} {}</b>\n\
             Zone: {} – {}\n\
             SL: {}  |  TP: {}\n\
             Feed: <code>{}</code>",
            i + 1,
            escape_html(&zone.pair),
            zone.side,
            zone.zone_low,
            zone.zone_high,
            zone.stop_loss,
            zone.take_profit_list(),
            escape_html(&feed),
        ));
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
