//! Deterministic collaborators for integration testing.
//!
//! A scripted price feed, a notifier that records every message, and a
//! manually advanced clock. All state is in-memory and controllable
//! from test code.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use zonewatch::engine::Clock;
use zonewatch::feed::PriceFeed;
use zonewatch::notify::Notifier;
use zonewatch::types::{DeliveryError, FeedError};

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Price feed that replays a queue of prices per symbol. When a queue
/// runs dry the last price repeats. Unknown symbols fail.
#[derive(Default)]
pub struct ScriptedFeed {
    queues: Mutex<HashMap<String, VecDeque<f64>>>,
    last: Mutex<HashMap<String, f64>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, symbol: &str, prices: &[f64]) {
        self.queues
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .extend(prices.iter().copied());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    async fn latest_price(&self, symbol: &str) -> Result<f64, FeedError> {
        self.calls.lock().unwrap().push(symbol.to_string());

        let next = self
            .queues
            .lock()
            .unwrap()
            .get_mut(symbol)
            .and_then(|q| q.pop_front());

        let mut last = self.last.lock().unwrap();
        match next.or_else(|| last.get(symbol).copied()) {
            Some(price) => {
                last.insert(symbol.to_string(), price);
                if price.is_finite() {
                    Ok(price)
                } else {
                    Err(FeedError::NonFinite {
                        symbol: symbol.to_string(),
                        price,
                    })
                }
            }
            None => Err(FeedError::NoQuote(symbol.to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Records delivered messages. Can be told to fail the next N sends.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail_next: Mutex<usize>,
    failures: Mutex<usize>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, n: usize) {
        *self.fail_next.lock().unwrap() = n;
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn failures(&self) -> usize {
        *self.failures.lock().unwrap()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<(), DeliveryError> {
        let mut fail_next = self.fail_next.lock().unwrap();
        if *fail_next > 0 {
            *fail_next -= 1;
            *self.failures.lock().unwrap() += 1;
            return Err(DeliveryError::Rejected("Bad Request: chat not found".into()));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
        )))
    }

    pub fn advance_secs(&self, secs: i64) {
        *self.0.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
