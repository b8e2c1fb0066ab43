//! Shared types for the ZONEWATCH bot.
//!
//! Zone definitions, alert events and the error taxonomy used by the
//! feed, notifier and configuration layers. Kept free of I/O so the
//! engine modules can depend on them without pulling in HTTP clients.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Trade direction of a zone. Decides which way stop-loss and
/// take-profit levels are crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Side {
    Sell,
    Buy,
}

impl Side {
    /// Stop-loss breach: above the level for SELL, below it for BUY.
    pub fn stop_loss_hit(self, price: f64, stop_loss: f64) -> bool {
        match self {
            Side::Sell => price >= stop_loss,
            Side::Buy => price <= stop_loss,
        }
    }

    /// Take-profit reached: below the target for SELL, above it for BUY.
    pub fn take_profit_hit(self, price: f64, target: f64) -> bool {
        match self {
            Side::Sell => price <= target,
            Side::Buy => price >= target,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Sell => write!(f, "SELL"),
            Side::Buy => write!(f, "BUY"),
        }
    }
}

impl TryFrom<String> for Side {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_uppercase().as_str() {
            "SELL" => Ok(Side::Sell),
            "BUY" => Ok(Side::Buy),
            other => Err(format!("unknown side '{other}', expected SELL or BUY")),
        }
    }
}

// ---------------------------------------------------------------------------
// Zone definition
// ---------------------------------------------------------------------------

/// A monitored price band with its trade levels.
///
/// Field names on the wire follow the zone JSON format:
/// `pair`, `side`, `zone_low`, `zone_high`, `sl`, `tp`, `symbol`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    pub pair: String,
    pub side: Side,
    pub zone_low: f64,
    pub zone_high: f64,
    #[serde(rename = "sl")]
    pub stop_loss: f64,
    /// Take-profit levels in definition order; index `i` is `tp{i+1}`.
    #[serde(rename = "tp", default)]
    pub take_profits: Vec<f64>,
    /// Price-feed identifier. Derived from `pair` when absent.
    #[serde(rename = "symbol", default, skip_serializing_if = "Option::is_none")]
    pub feed_symbol: Option<String>,
}

impl ZoneDefinition {
    /// Inclusive band membership: `zone_low <= price <= zone_high`.
    pub fn contains(&self, price: f64) -> bool {
        self.zone_low <= price && price <= self.zone_high
    }

    /// Uppercase the pair and drop an empty feed symbol.
    pub fn normalized(mut self) -> Self {
        self.pair = self.pair.trim().to_uppercase();
        self.feed_symbol = self
            .feed_symbol
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    /// Take-profit levels joined for display, e.g. `3269, 3250`.
    pub fn take_profit_list(&self) -> String {
        self.take_profits
            .iter()
            .map(|tp| tp.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[cfg(test)]
    pub fn sample() -> Self {
        ZoneDefinition {
            pair: "XAUUSD".to_string(),
            side: Side::Sell,
            zone_low: 3311.0,
            zone_high: 3319.0,
            stop_loss: 3320.0,
            take_profits: vec![3269.0],
            feed_symbol: Some("XAUUSD=X".to_string()),
        }
    }
}

impl fmt::Display for ZoneDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}–{}] SL {} TP [{}]",
            self.pair,
            self.side,
            self.zone_low,
            self.zone_high,
            self.stop_loss,
            self.take_profit_list(),
        )
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind of zone event. Each kind has its own cooldown key per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Enter,
    Exit,
    StopLoss,
    /// 1-based take-profit index in definition order.
    TakeProfit(usize),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Enter => write!(f, "enter"),
            EventKind::Exit => write!(f, "exit"),
            EventKind::StopLoss => write!(f, "sl"),
            EventKind::TakeProfit(i) => write!(f, "tp{i}"),
        }
    }
}

/// Cooldown key: pair plus event kind. Zones sharing a pair share keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub pair: String,
    pub kind: EventKind,
}

impl AlertKey {
    pub fn new(pair: &str, kind: EventKind) -> Self {
        Self {
            pair: pair.to_string(),
            kind,
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.pair, self.kind)
    }
}

/// A newly triggered event and the text to deliver for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneEvent {
    pub kind: EventKind,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Price-feed failures. Any of these skips the zone for the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Feed returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed feed payload: {0}")]
    Malformed(String),

    #[error("No quote available for {0}")]
    NoQuote(String),

    #[error("Non-finite price {price} for {symbol}")]
    NonFinite { symbol: String, price: f64 },
}

/// Notification delivery failures. Logged and dropped, never retried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Delivery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Delivery rejected with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Delivery rejected by API: {0}")]
    Rejected(String),
}

/// Configuration errors. Only the credential variants are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
