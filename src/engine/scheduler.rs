//! Scheduler — periodic scan and heartbeat tasks.
//!
//! Two independently timed loops share only the cooldown registry (via
//! the scan cycle) and the zone source:
//!
//! - scan: every `scan_interval` after `scan_delay`; re-loads zones each
//!   run so configuration edits apply without a restart
//! - heartbeat: every `heartbeat_interval` after `heartbeat_delay`
//!
//! Both stop scheduling new runs once the shutdown flag flips. A run
//! already in progress finishes first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use super::cooldown::CooldownRegistry;
use super::scan::{CycleReport, ScanCycle};
use super::Clock;
use crate::config::{Settings, ZoneSource, HEARTBEAT_INITIAL_DELAY, SCAN_INITIAL_DELAY};
use crate::messages;
use crate::notify::Notifier;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Counters and the last cycle report, readable by the status dashboard.
pub struct MonitorState {
    pub registry: Arc<CooldownRegistry>,
    pub started_at: DateTime<Utc>,
    cycles_run: AtomicU64,
    alerts_delivered: AtomicU64,
    heartbeats_sent: AtomicU64,
    last_cycle: RwLock<Option<CycleReport>>,
}

/// Point-in-time copy of [`MonitorState`] counters.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub started_at: DateTime<Utc>,
    pub cycles_run: u64,
    pub alerts_delivered: u64,
    pub heartbeats_sent: u64,
    pub cooldown_keys: usize,
    pub last_cycle: Option<CycleReport>,
}

impl MonitorState {
    pub fn new(registry: Arc<CooldownRegistry>, started_at: DateTime<Utc>) -> Self {
        Self {
            registry,
            started_at,
            cycles_run: AtomicU64::new(0),
            alerts_delivered: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
            last_cycle: RwLock::new(None),
        }
    }

    /// Assign the next cycle number to `report` and store it.
    async fn record_cycle(&self, report: &mut CycleReport) {
        report.cycle_number = self.cycles_run.fetch_add(1, Ordering::SeqCst) + 1;
        self.alerts_delivered
            .fetch_add(report.delivered as u64, Ordering::SeqCst);
        *self.last_cycle.write().await = Some(report.clone());
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run.load(Ordering::SeqCst)
    }

    pub fn alerts_delivered(&self) -> u64 {
        self.alerts_delivered.load(Ordering::SeqCst)
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            started_at: self.started_at,
            cycles_run: self.cycles_run(),
            alerts_delivered: self.alerts_delivered(),
            heartbeats_sent: self.heartbeats_sent(),
            cooldown_keys: self.registry.len(),
            last_cycle: self.last_cycle.read().await.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub scan_interval: Duration,
    pub scan_delay: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_delay: Duration,
}

impl Schedule {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            scan_interval: settings.interval,
            scan_delay: SCAN_INITIAL_DELAY,
            heartbeat_interval: settings.heartbeat,
            heartbeat_delay: HEARTBEAT_INITIAL_DELAY,
        }
    }
}

/// Resolve once `shutdown` reads `true` or its sender is gone.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Run `action` every `period`, first after `delay`, until shutdown.
async fn every<F, Fut>(
    delay: Duration,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut action: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval_at(Instant::now() + delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = ticker.tick() => action().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    schedule: Schedule,
    zones: Arc<dyn ZoneSource>,
    scan: ScanCycle,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    state: Arc<MonitorState>,
}

impl Scheduler {
    pub fn new(
        schedule: Schedule,
        zones: Arc<dyn ZoneSource>,
        scan: ScanCycle,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        state: Arc<MonitorState>,
    ) -> Self {
        Self {
            schedule,
            zones,
            scan,
            notifier,
            clock,
            state,
        }
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    /// Load a fresh zone snapshot and run one scan cycle over it.
    pub async fn run_scan(&self) -> CycleReport {
        let zones = self.zones.load();
        let mut report = self.scan.run(&zones).await;
        self.state.record_cycle(&mut report).await;
        log_cycle_report(&report);
        report
    }

    /// Send the liveness message. Returns whether it was delivered.
    pub async fn send_heartbeat(&self) -> bool {
        let text = messages::heartbeat(self.clock.now(), self.schedule.scan_interval.as_secs());
        match self.notifier.notify(&text).await {
            Ok(()) => {
                self.state.heartbeats_sent.fetch_add(1, Ordering::SeqCst);
                info!("Heartbeat sent");
                true
            }
            Err(e) => {
                error!(error = %e, "Heartbeat delivery failed");
                false
            }
        }
    }

    /// Spawn the scan and heartbeat loops. Both exit after `shutdown`
    /// flips to `true`.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let this = Arc::new(self);
        let schedule = this.schedule;

        info!(
            scan_secs = schedule.scan_interval.as_secs(),
            heartbeat_secs = schedule.heartbeat_interval.as_secs(),
            "Scheduler starting"
        );

        let scan = {
            let this = Arc::clone(&this);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                every(schedule.scan_delay, schedule.scan_interval, shutdown, || {
                    let this = Arc::clone(&this);
                    async move {
                        this.run_scan().await;
                    }
                })
                .await;
                info!("Scan loop stopped");
            })
        };

        let heartbeat = {
            let this = Arc::clone(&this);
            tokio::spawn(async move {
                every(
                    schedule.heartbeat_delay,
                    schedule.heartbeat_interval,
                    shutdown,
                    || {
                        let this = Arc::clone(&this);
                        async move {
                            this.send_heartbeat().await;
                        }
                    },
                )
                .await;
                info!("Heartbeat loop stopped");
            })
        };

        vec![scan, heartbeat]
    }
}

/// Log a one-line cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle = report.cycle_number,
        zones = report.zones_scanned,
        no_symbol = report.skipped_no_symbol,
        feed_failures = report.feed_failures,
        events = report.events,
        delivered = report.delivered,
        delivery_failures = report.delivery_failures,
        "Cycle complete"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticZoneSource;
    use crate::engine::evaluator::ZoneEvaluator;
    use crate::engine::SystemClock;
    use crate::feed::MockPriceFeed;
    use crate::notify::MockNotifier;
    use crate::types::{DeliveryError, ZoneDefinition};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct ScriptedZones {
        calls: AtomicUsize,
        zones: Mutex<Vec<ZoneDefinition>>,
    }

    impl ZoneSource for ScriptedZones {
        fn load(&self) -> Vec<ZoneDefinition> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.zones.lock().unwrap().clone()
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            scan_interval: Duration::from_secs(10),
            scan_delay: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(3600),
            heartbeat_delay: Duration::from_secs(10),
        }
    }

    fn build(
        zones: Arc<dyn ZoneSource>,
        feed: MockPriceFeed,
        notifier: MockNotifier,
    ) -> Scheduler {
        let registry = Arc::new(CooldownRegistry::new(Duration::from_secs(120)));
        let notifier: Arc<dyn Notifier> = Arc::new(notifier);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let scan = ScanCycle::new(
            ZoneEvaluator::new(Arc::clone(&registry)),
            Arc::new(feed),
            Arc::clone(&notifier),
            Arc::clone(&clock),
        );
        Scheduler::new(
            schedule(),
            zones,
            scan,
            notifier,
            clock,
            Arc::new(MonitorState::new(registry, Utc::now())),
        )
    }

    #[tokio::test]
    async fn test_run_scan_records_cycle() {
        let mut feed = MockPriceFeed::new();
        feed.expect_latest_price().returning(|_| Ok(3315.0));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_| Ok(()));

        let zones = Arc::new(StaticZoneSource(vec![ZoneDefinition::sample()]));
        let scheduler = build(zones, feed, notifier);

        let first = scheduler.run_scan().await;
        let second = scheduler.run_scan().await;
        assert_eq!(first.cycle_number, 1);
        assert_eq!(second.cycle_number, 2);
        assert_eq!(second.delivered, 0);

        let snap = scheduler.state().snapshot().await;
        assert_eq!(snap.cycles_run, 2);
        assert_eq!(snap.alerts_delivered, 1);
        assert_eq!(snap.cooldown_keys, 1);
        assert_eq!(snap.last_cycle.unwrap().cycle_number, 2);
    }

    #[tokio::test]
    async fn test_zones_reloaded_every_scan() {
        let mut feed = MockPriceFeed::new();
        feed.expect_latest_price().returning(|_| Ok(1.0));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_| Ok(()));

        let source = Arc::new(ScriptedZones {
            calls: AtomicUsize::new(0),
            zones: Mutex::new(vec![ZoneDefinition::sample()]),
        });
        let scheduler = build(source.clone(), feed, notifier);

        assert_eq!(scheduler.run_scan().await.zones_scanned, 1);
        source.zones.lock().unwrap().clear();
        assert_eq!(scheduler.run_scan().await.zones_scanned, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_heartbeat_failure_is_swallowed() {
        let feed = MockPriceFeed::new();
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|t: &str| t.starts_with("✅ Bot running"))
            .times(1)
            .returning(|_| Err(DeliveryError::Rejected("Forbidden".into())));

        let scheduler = build(Arc::new(StaticZoneSource(vec![])), feed, notifier);
        assert!(!scheduler.send_heartbeat().await);
        assert_eq!(scheduler.state().heartbeats_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loops_follow_schedule_and_stop() {
        let mut feed = MockPriceFeed::new();
        feed.expect_latest_price().returning(|_| Ok(3315.0));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_| Ok(()));

        let zones = Arc::new(StaticZoneSource(vec![ZoneDefinition::sample()]));
        let scheduler = build(zones, feed, notifier);
        let state = Arc::clone(scheduler.state());

        let (tx, rx) = watch::channel(false);
        let handles = scheduler.spawn(rx);

        // Scans at t=5, 15, 25; heartbeat at t=10.
        tokio::time::sleep(Duration::from_secs(27)).await;
        assert_eq!(state.cycles_run(), 3);
        assert_eq!(state.heartbeats_sent(), 1);

        tx.send(true).unwrap();
        for h in handles {
            h.await.unwrap();
        }

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(state.cycles_run(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        wait_for_shutdown(&mut rx).await;
    }
}
