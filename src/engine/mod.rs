//! Core engine — cooldowns, zone evaluation, the scan cycle and the
//! scheduler that drives it.

pub mod cooldown;
pub mod evaluator;
pub mod scan;
pub mod scheduler;

use chrono::{DateTime, Utc};

/// Wall-clock source. Injected so cooldown behaviour is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
