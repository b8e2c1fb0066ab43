//! ZONEWATCH — price-zone alert bot
//!
//! Entry point. Loads settings, initialises structured logging, wires
//! the price feed and Telegram client into the scheduler and command
//! loop, and runs until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use zonewatch::commands::handler::{run_command_loop, CommandHandler};
use zonewatch::config::{Settings, ZoneSource};
use zonewatch::dashboard::{self, routes::DashboardState};
use zonewatch::engine::cooldown::CooldownRegistry;
use zonewatch::engine::evaluator::ZoneEvaluator;
use zonewatch::engine::scan::ScanCycle;
use zonewatch::engine::scheduler::{MonitorState, Schedule, Scheduler};
use zonewatch::engine::{Clock, SystemClock};
use zonewatch::feed::yahoo::YahooFeed;
use zonewatch::feed::PriceFeed;
use zonewatch::notify::telegram::TelegramClient;
use zonewatch::notify::Notifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    // Missing TOKEN / CHANNEL_ID stops here.
    let settings = Settings::load()?;

    info!(
        channel = %settings.channel_id,
        interval_secs = settings.interval.as_secs(),
        cooldown_secs = settings.cooldown.as_secs(),
        heartbeat_secs = settings.heartbeat.as_secs(),
        zones_file = ?settings.zones_file,
        "ZONEWATCH starting up"
    );

    // -- Collaborators ---------------------------------------------------

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let feed: Arc<dyn PriceFeed> = Arc::new(YahooFeed::new(settings.feed_timeout)?);
    let telegram = Arc::new(TelegramClient::new(
        settings.token.clone(),
        settings.channel_id.clone(),
    )?);
    let notifier: Arc<dyn Notifier> = telegram.clone();
    let zones: Arc<dyn ZoneSource> = Arc::new(settings.zone_source());

    info!(feed = feed.name(), zones = zones.load().len(), "Collaborators ready");

    // -- Engine ----------------------------------------------------------

    let registry = Arc::new(CooldownRegistry::new(settings.cooldown));
    let monitor = Arc::new(MonitorState::new(Arc::clone(&registry), clock.now()));

    let scan = ScanCycle::new(
        ZoneEvaluator::new(registry),
        Arc::clone(&feed),
        Arc::clone(&notifier),
        Arc::clone(&clock),
    );
    let scheduler = Scheduler::new(
        Schedule::from_settings(&settings),
        Arc::clone(&zones),
        scan,
        Arc::clone(&notifier),
        Arc::clone(&clock),
        Arc::clone(&monitor),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = scheduler.spawn(shutdown_rx.clone());

    // -- Command surface -------------------------------------------------

    let bot_username = match telegram.get_me().await {
        Ok(name) => name,
        Err(e) => {
            warn!(error = %e, "Could not fetch bot username, accepting any /cmd@name");
            None
        }
    };
    let handler = Arc::new(
        CommandHandler::new(
            settings.clone(),
            Arc::clone(&zones),
            Arc::clone(&notifier),
            Arc::clone(&clock),
        )
        .with_bot_username(bot_username),
    );
    tasks.push(tokio::spawn(run_command_loop(
        telegram,
        handler,
        shutdown_rx.clone(),
    )));

    if let Some(port) = settings.dashboard_port {
        let state = Arc::new(DashboardState::new(
            Arc::clone(&monitor),
            Arc::clone(&zones),
            &settings,
        ));
        match dashboard::spawn_dashboard(state, port, shutdown_rx.clone()).await {
            Ok(handle) => tasks.push(handle),
            Err(e) => error!(error = format!("{e:#}"), "Dashboard disabled"),
        }
    }

    info!("Running. Press Ctrl+C to stop.");

    // -- Shutdown --------------------------------------------------------

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C, shutting down");
    }
    info!("Shutdown signal received.");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Task ended abnormally");
        }
    }

    info!(
        cycles = monitor.cycles_run(),
        alerts = monitor.alerts_delivered(),
        heartbeats = monitor.heartbeats_sent(),
        "ZONEWATCH shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("zonewatch=info"));

    let json_logging = std::env::var("ZONEWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
