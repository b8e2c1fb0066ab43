//! Zone evaluator.
//!
//! Given a zone and a price, decides which events fire this cycle.
//! Rules run in a fixed order and every rule is gated by its own
//! cooldown key:
//!
//! 1. `enter` when the price is inside `[zone_low, zone_high]`
//! 2. `exit` when it is outside (mutually exclusive with 1)
//! 3. `sl` when the stop-loss is breached for the zone's side
//! 4. `tp1..tpN` for every reached target, in definition order
//!
//! Re-alerting is periodic rather than edge-triggered: a price that sits
//! inside the zone produces a fresh `enter` each time the cooldown expires.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::cooldown::CooldownRegistry;
use crate::messages;
use crate::types::{AlertKey, EventKind, ZoneDefinition, ZoneEvent};

pub struct ZoneEvaluator {
    registry: Arc<CooldownRegistry>,
}

impl ZoneEvaluator {
    pub fn new(registry: Arc<CooldownRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CooldownRegistry> {
        &self.registry
    }

    /// Events newly permitted for `zone` at `price`. Commits cooldown state
    /// for every returned event before the caller delivers it.
    pub fn evaluate(&self, zone: &ZoneDefinition, price: f64, now: DateTime<Utc>) -> Vec<ZoneEvent> {
        let mut events = Vec::new();
        let mut fire = |kind: EventKind, message: &dyn Fn() -> String| {
            if self.registry.should_alert(&AlertKey::new(&zone.pair, kind), now) {
                events.push(ZoneEvent {
                    kind,
                    message: message(),
                });
            }
        };

        if zone.contains(price) {
            fire(EventKind::Enter, &|| messages::enter(zone, price));
        } else {
            fire(EventKind::Exit, &|| messages::exit(zone, price));
        }

        if zone.side.stop_loss_hit(price, zone.stop_loss) {
            fire(EventKind::StopLoss, &|| messages::stop_loss(zone, price));
        }

        for (i, &target) in zone.take_profits.iter().enumerate() {
            if zone.side.take_profit_hit(price, target) {
                let index = i + 1;
                fire(EventKind::TakeProfit(index), &|| {
                    messages::take_profit(zone, price, index, target)
                });
            }
        }

        events
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
