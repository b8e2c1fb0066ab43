//! Scan cycle — one evaluation pass over every configured zone.
//!
//! For each zone, in configuration order: resolve the feed symbol, fetch
//! a price, evaluate, then deliver each event's message in the order the
//! evaluator produced them. A zone that cannot be priced is skipped for
//! this cycle only; a message that cannot be delivered does not hold up
//! the rest. Nothing here returns an error to the scheduler.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::evaluator::ZoneEvaluator;
use super::Clock;
use crate::config::resolve_feed_symbol;
use crate::feed::PriceFeed;
use crate::notify::Notifier;
use crate::types::{DeliveryError, EventKind, FeedError, ZoneDefinition};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one zone in one cycle.
#[derive(Debug)]
pub enum ZoneOutcome {
    /// No explicit symbol and no table entry for the pair.
    NoFeedSymbol,
    /// The feed failed or returned an unusable price.
    FeedUnavailable { symbol: String, error: FeedError },
    /// Priced and evaluated. `failed` lists events whose delivery failed.
    Evaluated {
        price: f64,
        delivered: Vec<EventKind>,
        failed: Vec<(EventKind, DeliveryError)>,
    },
}

/// Summary of a complete scan cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub zones_scanned: usize,
    pub skipped_no_symbol: usize,
    pub feed_failures: usize,
    pub events: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CycleReport {
    fn record(&mut self, pair: &str, outcome: &ZoneOutcome) {
        self.zones_scanned += 1;
        match outcome {
            ZoneOutcome::NoFeedSymbol => {
                self.skipped_no_symbol += 1;
                warn!(pair, "Missing feed symbol, skipping zone");
            }
            ZoneOutcome::FeedUnavailable { symbol, error } => {
                self.feed_failures += 1;
                warn!(pair, symbol = %symbol, error = %error, "Price fetch failed, skipping zone");
            }
            ZoneOutcome::Evaluated {
                price,
                delivered,
                failed,
            } => {
                self.events += delivered.len() + failed.len();
                self.delivered += delivered.len();
                self.delivery_failures += failed.len();
                if !delivered.is_empty() {
                    info!(pair, price, events = ?delivered, "Alerts sent");
                }
                for (kind, e) in failed {
                    error!(pair, event = %kind, error = %e, "Alert delivery failed");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scan cycle
// ---------------------------------------------------------------------------

pub struct ScanCycle {
    evaluator: ZoneEvaluator,
    feed: Arc<dyn PriceFeed>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl ScanCycle {
    pub fn new(
        evaluator: ZoneEvaluator,
        feed: Arc<dyn PriceFeed>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            evaluator,
            feed,
            notifier,
            clock,
        }
    }

    pub fn evaluator(&self) -> &ZoneEvaluator {
        &self.evaluator
    }

    /// Run one pass over `zones`. Zones are processed sequentially in
    /// the order given.
    pub async fn run(&self, zones: &[ZoneDefinition]) -> CycleReport {
        let mut report = CycleReport {
            timestamp: Some(self.clock.now()),
            ..Default::default()
        };

        for zone in zones {
            let outcome = self.scan_zone(zone).await;
            report.record(&zone.pair, &outcome);
        }

        debug!(
            zones = report.zones_scanned,
            events = report.events,
            "Scan pass finished"
        );
        report
    }

    /// Price, evaluate and deliver for a single zone.
    pub async fn scan_zone(&self, zone: &ZoneDefinition) -> ZoneOutcome {
        let Some(symbol) = resolve_feed_symbol(zone) else {
            return ZoneOutcome::NoFeedSymbol;
        };

        let price = match self.feed.latest_price(&symbol).await {
            Ok(p) if p.is_finite() => p,
            Ok(p) => {
                return ZoneOutcome::FeedUnavailable {
                    error: FeedError::NonFinite {
                        symbol: symbol.clone(),
                        price: p,
                    },
                    symbol,
                }
            }
            Err(error) => return ZoneOutcome::FeedUnavailable { symbol, error },
        };

        let events = self.evaluator.evaluate(zone, price, self.clock.now());

        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for event in events {
            match self.notifier.notify(&event.message).await {
                Ok(()) => delivered.push(event.kind),
                Err(e) => failed.push((event.kind, e)),
            }
        }

        ZoneOutcome::Evaluated {
            price,
            delivered,
            failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
