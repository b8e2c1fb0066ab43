//! Cooldown registry — alert deduplication.
//!
//! Remembers when each `pair + event kind` key last alerted and refuses
//! a repeat until the cooldown has elapsed. The check and the update
//! happen under one lock, so two concurrent evaluations of the same key
//! cannot both pass. State lives in memory only and resets on restart.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::types::AlertKey;

pub struct CooldownRegistry {
    cooldown: Duration,
    last_alert: Mutex<HashMap<AlertKey, DateTime<Utc>>>,
}

impl CooldownRegistry {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Check-and-set. Returns `true` and records `now` if the key has never
    /// alerted or its last alert is at least one cooldown ago; otherwise
    /// returns `false` and leaves the registry untouched.
    pub fn should_alert(&self, key: &AlertKey, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries();

        if let Some(last) = entries.get(key) {
            // A clock that stepped backwards counts as zero elapsed.
            let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.cooldown {
                debug!(key = %key, elapsed_secs = elapsed.as_secs(), "Alert suppressed by cooldown");
                return false;
            }
        }

        entries.insert(key.clone(), now);
        true
    }

    /// When `key` last alerted, if ever.
    pub fn last_alert(&self, key: &AlertKey) -> Option<DateTime<Utc>> {
        self.entries().get(key).copied()
    }

    /// Snapshot of all keys and their last alert time, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .entries()
            .iter()
            .map(|(k, t)| (k.to_string(), *t))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<AlertKey, DateTime<Utc>>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.last_alert.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
