//! Yahoo Finance quote feed.
//!
//! No API key required.
//! Endpoint: https://query1.finance.yahoo.com/v7/finance/quote?symbols={symbol}
//! The first result's `regularMarketPrice` is preferred, falling back to
//! `postMarketPrice`, then `ask`, then `bid`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::PriceFeed;
use crate::types::FeedError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://query1.finance.yahoo.com/v7/finance";
const FEED_NAME: &str = "yahoo";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quote {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    post_market_price: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(default)]
    bid: Option<f64>,
}

impl Quote {
    fn best_price(&self) -> Option<f64> {
        self.regular_market_price
            .or(self.post_market_price)
            .or(self.ask)
            .or(self.bid)
    }
}

/// Extract the price from a quote payload.
fn parse_quote(symbol: &str, body: &str) -> Result<f64, FeedError> {
    let envelope: QuoteEnvelope =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

    let price = envelope
        .quote_response
        .result
        .first()
        .and_then(Quote::best_price)
        .ok_or_else(|| FeedError::NoQuote(symbol.to_string()))?;

    if !price.is_finite() {
        return Err(FeedError::NonFinite {
            symbol: symbol.to_string(),
            price,
        });
    }
    Ok(price)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct YahooFeed {
    http: Client,
    base_url: String,
}

impl YahooFeed {
    /// Create a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(BASE_URL, timeout)
    }

    /// Point the client at another quote endpoint (test servers, proxies).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("ZONEWATCH/0.1.0 (price-zone-alerts)")
            .build()
            .context("Failed to build HTTP client for Yahoo Finance")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceFeed for YahooFeed {
    async fn latest_price(&self, symbol: &str) -> Result<f64, FeedError> {
        let url = format!(
            "{}/quote?symbols={}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        debug!(url = %url, "Fetching quote");

        let resp = self.http.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        parse_quote(symbol, &body)
    }

    fn name(&self) -> &str {
        FEED_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
