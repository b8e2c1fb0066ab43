//! End-to-end scan scenarios.
//!
//! Each test wires a real `ScanCycle` (evaluator + cooldown registry)
//! to the scripted feed, recording notifier and manual clock, then
//! drives cycles by hand.

use std::sync::Arc;
use std::time::Duration;

use zonewatch::config::{ConfigZoneSource, StaticZoneSource, ZoneSource};
use zonewatch::engine::cooldown::CooldownRegistry;
use zonewatch::engine::evaluator::ZoneEvaluator;
use zonewatch::engine::scan::ScanCycle;
use zonewatch::engine::scheduler::{MonitorState, Schedule, Scheduler};
use zonewatch::engine::Clock;
use zonewatch::types::{Side, ZoneDefinition};

use crate::mocks::{ManualClock, RecordingNotifier, ScriptedFeed};

struct Harness {
    feed: Arc<ScriptedFeed>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
    registry: Arc<CooldownRegistry>,
    scan: ScanCycle,
}

impl Harness {
    fn new(cooldown_secs: u64) -> Self {
        let feed = ScriptedFeed::new();
        let notifier = RecordingNotifier::new();
        let clock = ManualClock::new();
        let registry = Arc::new(CooldownRegistry::new(Duration::from_secs(cooldown_secs)));
        let scan = ScanCycle::new(
            ZoneEvaluator::new(Arc::clone(&registry)),
            feed.clone(),
            notifier.clone(),
            clock.clone(),
        );
        Self {
            feed,
            notifier,
            clock,
            registry,
            scan,
        }
    }
}

fn xauusd_sell() -> ZoneDefinition {
    ZoneDefinition {
        pair: "XAUUSD".to_string(),
        side: Side::Sell,
        zone_low: 3311.0,
        zone_high: 3319.0,
        stop_loss: 3320.0,
        take_profits: vec![3269.0],
        feed_symbol: None,
    }
}

#[tokio::test]
async fn test_enter_then_exit_and_stop_loss() {
    let h = Harness::new(120);
    h.feed.push("XAUUSD=X", &[3315.0, 3320.0]);
    let zones = [xauusd_sell()];

    let first = h.scan.run(&zones).await;
    assert_eq!(first.delivered, 1);
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("entered"));

    h.notifier.clear();
    h.clock.advance_secs(120);

    let second = h.scan.run(&zones).await;
    assert_eq!(second.delivered, 2);
    let sent = h.notifier.sent();
    assert!(sent[0].contains("left the zone"));
    assert!(sent[1].contains("SL HIT at <b>3320</b>"));
}

#[tokio::test]
async fn test_price_parked_in_zone_reminds_after_cooldown() {
    let h = Harness::new(120);
    h.feed.push("XAUUSD=X", &[3315.0]);
    let zones = [xauusd_sell()];

    // One cycle every 10 s for 4 minutes.
    for _ in 0..25 {
        h.scan.run(&zones).await;
        h.clock.advance_secs(10);
    }
    // t = 0, 120, 240
    assert_eq!(h.notifier.sent().len(), 3);
    assert!(h.notifier.sent().iter().all(|m| m.contains("entered")));
}

#[tokio::test]
async fn test_zero_cooldown_alerts_every_cycle() {
    let h = Harness::new(0);
    h.feed.push("XAUUSD=X", &[3315.0]);
    let zones = [xauusd_sell()];

    for _ in 0..3 {
        let report = h.scan.run(&zones).await;
        assert_eq!(report.delivered, 1);
        h.clock.advance_secs(10);
    }
    // Same instant still passes: nothing is deduplicated.
    assert_eq!(h.scan.run(&zones).await.delivered, 1);
    assert_eq!(h.notifier.sent().len(), 4);
}

#[tokio::test]
async fn test_reentry_sequence() {
    let h = Harness::new(5);
    h.feed.push("XAUUSD=X", &[3315.0, 3330.0, 3315.0]);
    let mut zone = xauusd_sell();
    zone.stop_loss = 3400.0;
    let zones = [zone];

    for _ in 0..3 {
        h.scan.run(&zones).await;
        h.clock.advance_secs(10);
    }
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].contains("entered"));
    assert!(sent[1].contains("left the zone"));
    assert!(sent[2].contains("entered"));
}

#[tokio::test]
async fn test_buy_zone_two_take_profits_same_cycle() {
    let h = Harness::new(120);
    h.feed.push("GC=F", &[3270.0]);
    let zone = ZoneDefinition {
        pair: "GOLD".to_string(),
        side: Side::Buy,
        zone_low: 3230.0,
        zone_high: 3240.0,
        stop_loss: 3220.0,
        take_profits: vec![3269.0, 3250.0],
        feed_symbol: Some("GC=F".to_string()),
    };

    let report = h.scan.run(&[zone]).await;
    assert_eq!(report.delivered, 3);
    let sent = h.notifier.sent();
    assert!(sent[1].contains("TP1 HIT"));
    assert!(sent[2].contains("TP2 HIT"));
}

#[tokio::test]
async fn test_unresolvable_symbol_never_alerts() {
    let h = Harness::new(1);
    let zone = ZoneDefinition {
        pair: "NZDCAD".to_string(),
        ..xauusd_sell()
    };

    for _ in 0..5 {
        let report = h.scan.run(std::slice::from_ref(&zone)).await;
        assert_eq!(report.skipped_no_symbol, 1);
        h.clock.advance_secs(10);
    }
    assert!(h.notifier.sent().is_empty());
    assert!(h.feed.calls().is_empty());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_feed_outage_then_recovery() {
    let h = Harness::new(120);
    let zones = [xauusd_sell()];

    // No prices scripted yet: feed fails.
    let report = h.scan.run(&zones).await;
    assert_eq!(report.feed_failures, 1);
    assert!(h.registry.is_empty());

    h.feed.push("XAUUSD=X", &[f64::NAN]);
    let report = h.scan.run(&zones).await;
    assert_eq!(report.feed_failures, 1);

    h.feed.push("XAUUSD=X", &[3312.0]);
    let report = h.scan.run(&zones).await;
    assert_eq!(report.delivered, 1);
}

#[tokio::test]
async fn test_delivery_failure_is_lossy_and_isolated() {
    let h = Harness::new(120);
    h.feed.push("XAUUSD=X", &[3325.0]);
    h.feed.push("EURUSD=X", &[1.2]);
    let eur = ZoneDefinition {
        pair: "EURUSD".to_string(),
        side: Side::Buy,
        zone_low: 1.08,
        zone_high: 1.09,
        stop_loss: 1.07,
        take_profits: vec![1.1],
        feed_symbol: None,
    };
    let zones = [xauusd_sell(), eur];

    h.notifier.fail_next(1);
    let report = h.scan.run(&zones).await;
    // XAUUSD: exit (lost) + sl; EURUSD: exit + tp1.
    assert_eq!(report.events, 4);
    assert_eq!(report.delivery_failures, 1);
    assert_eq!(h.notifier.failures(), 1);
    assert_eq!(h.notifier.sent().len(), 3);

    // The lost exit alert is not retried within the cooldown.
    h.clock.advance_secs(30);
    let report = h.scan.run(&zones).await;
    assert_eq!(report.events, 0);
}

#[tokio::test]
async fn test_duplicate_pairs_cross_suppress() {
    let h = Harness::new(120);
    h.feed.push("XAUUSD=X", &[3315.0]);
    let wide = ZoneDefinition {
        zone_low: 3300.0,
        zone_high: 3330.0,
        ..xauusd_sell()
    };
    let report = h.scan.run(&[xauusd_sell(), wide]).await;
    assert_eq!(report.zones_scanned, 2);
    assert_eq!(report.delivered, 1);
}

#[tokio::test]
async fn test_scheduler_scan_uses_json_config() {
    let feed = ScriptedFeed::new();
    feed.push("BTC-USD", &[60500.0]);
    let notifier = RecordingNotifier::new();
    let clock = ManualClock::new();
    let registry = Arc::new(CooldownRegistry::new(Duration::from_secs(120)));

    let json = r#"[{"pair":"btcusd","side":"buy","zone_low":60000,"zone_high":61000,
                    "sl":59000,"tp":[62000]}]"#;
    let zones: Arc<dyn ZoneSource> =
        Arc::new(ConfigZoneSource::new(Some(json.to_string()), None));

    let scan = ScanCycle::new(
        ZoneEvaluator::new(Arc::clone(&registry)),
        feed.clone(),
        notifier.clone(),
        clock.clone(),
    );
    let scheduler = Scheduler::new(
        Schedule {
            scan_interval: Duration::from_secs(10),
            scan_delay: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(3600),
            heartbeat_delay: Duration::from_secs(10),
        },
        zones,
        scan,
        notifier.clone(),
        clock.clone(),
        Arc::new(MonitorState::new(registry, clock.now())),
    );

    let report = scheduler.run_scan().await;
    assert_eq!(report.cycle_number, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(feed.calls(), vec!["BTC-USD".to_string()]);
    assert!(notifier.sent()[0].contains("<b>BTCUSD</b>"));
    assert!(notifier.sent()[0].contains("BUY ZONE"));

    assert!(scheduler.send_heartbeat().await);
    assert!(notifier.sent()[1].contains("2026-05-04 09:00:00 UTC"));
}

#[tokio::test]
async fn test_static_source_snapshot_is_independent() {
    let source = StaticZoneSource(vec![xauusd_sell()]);
    let mut snapshot = source.load();
    snapshot[0].zone_low = 0.0;
    assert_eq!(source.load()[0].zone_low, 3311.0);
}
