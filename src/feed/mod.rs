//! Price feeds.
//!
//! Defines the `PriceFeed` trait and the Yahoo Finance implementation.

pub mod yahoo;

use async_trait::async_trait;

use crate::types::FeedError;

/// Source of the latest traded price for a feed symbol.
///
/// One best-effort fetch per zone per cycle; implementations must bound
/// their own latency with a timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Latest price for `symbol`. Finite on success.
    async fn latest_price(&self, symbol: &str) -> Result<f64, FeedError>;

    /// Feed name for logging.
    fn name(&self) -> &str;
}
