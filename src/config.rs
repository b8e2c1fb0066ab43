//! Configuration loading.
//!
//! Settings come from an optional TOML file (`zonewatch.toml`, or the
//! path in `ZONEWATCH_CONFIG`) with environment variables layered on top.
//! The bot token and channel id are required; everything else has a
//! default. Zone definitions are not part of [`Settings`]: they are
//! re-read on every scan through a [`ZoneSource`].

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{ConfigError, Side, ZoneDefinition};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG_FILE: &str = "zonewatch.toml";
const DEFAULT_INTERVAL_SECS: u64 = 10;
const DEFAULT_COOLDOWN_SECS: u64 = 120;
const DEFAULT_HEARTBEAT_SECS: u64 = 3600;
const DEFAULT_FEED_TIMEOUT_SECS: u64 = 10;

/// Delay before the first scan after startup.
pub const SCAN_INITIAL_DELAY: Duration = Duration::from_secs(5);
/// Delay before the first heartbeat after startup.
pub const HEARTBEAT_INITIAL_DELAY: Duration = Duration::from_secs(10);

/// Static pair → Yahoo Finance symbol table.
const FEED_SYMBOLS: &[(&str, &str)] = &[
    ("XAUUSD", "XAUUSD=X"),
    ("BTCUSD", "BTC-USD"),
    ("EURUSD", "EURUSD=X"),
    ("GBPUSD", "GBPUSD=X"),
    ("USDJPY", "JPY=X"),
];

// ---------------------------------------------------------------------------
// Settings file
// ---------------------------------------------------------------------------

/// Shape of the optional TOML settings file. Every field is optional.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FileConfig {
    pub bot: BotSection,
    pub scan: ScanSection,
    pub zones: ZonesSection,
    pub dashboard: DashboardSection,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BotSection {
    /// Name of the env var holding the token, if not `TOKEN`.
    pub token_env: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScanSection {
    pub interval_secs: Option<u64>,
    pub cooldown_secs: Option<u64>,
    pub heartbeat_secs: Option<u64>,
    pub feed_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ZonesSection {
    pub json: Option<String>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DashboardSection {
    pub port: Option<u16>,
}

impl FileConfig {
    /// Load the settings file if it exists. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using env only");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Runtime settings after merging file and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: SecretString,
    pub channel_id: String,
    pub interval: Duration,
    pub cooldown: Duration,
    pub heartbeat: Duration,
    pub feed_timeout: Duration,
    pub zones_json: Option<String>,
    pub zones_file: Option<PathBuf>,
    pub dashboard_port: Option<u16>,
}

impl Settings {
    /// Load settings from the settings file and the process environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var("ZONEWATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let file = FileConfig::load(&path)?;
        let settings = Self::from_sources(file, |key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Merge a parsed settings file with an environment lookup.
    /// Environment values win.
    pub fn from_sources(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, ConfigError> {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token_env = file.bot.token_env.as_deref().unwrap_or("TOKEN");
        let token = env(token_env).ok_or(ConfigError::Missing("TOKEN"))?;
        let channel_id = env("CHANNEL_ID")
            .or(file.bot.channel_id)
            .ok_or(ConfigError::Missing("CHANNEL_ID"))?;

        // Periods feed `tokio::time::interval`, which rejects zero; a zero
        // cooldown just disables deduplication.
        let secs = |key: &'static str, file_value: Option<u64>, default: u64, allow_zero: bool| {
            let (value, raw) = match env(key) {
                Some(raw) => (raw.parse::<u64>().ok(), raw),
                None => {
                    let value = file_value.unwrap_or(default);
                    (Some(value), value.to_string())
                }
            };
            value
                .filter(|v| allow_zero || *v > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::Invalid { key, value: raw })
        };

        let dashboard_port = match env("DASHBOARD_PORT") {
            Some(raw) => Some(raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "DASHBOARD_PORT",
                value: raw,
            })?),
            None => file.dashboard.port,
        };

        Ok(Self {
            token: SecretString::new(token),
            channel_id,
            interval: secs("INTERVAL_S", file.scan.interval_secs, DEFAULT_INTERVAL_SECS, false)?,
            cooldown: secs("COOLDOWN_S", file.scan.cooldown_secs, DEFAULT_COOLDOWN_SECS, true)?,
            heartbeat: secs("HEARTBEAT_S", file.scan.heartbeat_secs, DEFAULT_HEARTBEAT_SECS, false)?,
            feed_timeout: secs(
                "FEED_TIMEOUT_S",
                file.scan.feed_timeout_secs,
                DEFAULT_FEED_TIMEOUT_SECS,
                false,
            )?,
            zones_json: env("ZONES_JSON").or(file.zones.json),
            zones_file: env("ZONES_FILE").map(PathBuf::from).or(file.zones.file),
            dashboard_port,
        })
    }

    /// Zone source matching these settings.
    pub fn zone_source(&self) -> ConfigZoneSource {
        ConfigZoneSource::new(self.zones_json.clone(), self.zones_file.clone())
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            token: SecretString::new("test-token".to_string()),
            channel_id: "@zonewatch_test".to_string(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            feed_timeout: Duration::from_secs(DEFAULT_FEED_TIMEOUT_SECS),
            zones_json: None,
            zones_file: None,
            dashboard_port: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

/// Built-in zone list used when no zone configuration is supplied
/// or the supplied one cannot be parsed.
pub fn default_zones() -> Vec<ZoneDefinition> {
    vec![ZoneDefinition {
        pair: "XAUUSD".to_string(),
        side: Side::Sell,
        zone_low: 3311.0,
        zone_high: 3319.0,
        stop_loss: 3320.0,
        take_profits: vec![3269.0],
        feed_symbol: Some("XAUUSD=X".to_string()),
    }]
}

/// Look up the feed symbol for a pair in the static table.
pub fn lookup_feed_symbol(pair: &str) -> Option<&'static str> {
    let pair = pair.trim().to_uppercase();
    FEED_SYMBOLS
        .iter()
        .find(|(p, _)| *p == pair)
        .map(|(_, symbol)| *symbol)
}

/// Explicit feed symbol if set, otherwise the static table entry.
pub fn resolve_feed_symbol(zone: &ZoneDefinition) -> Option<String> {
    zone.feed_symbol
        .clone()
        .or_else(|| lookup_feed_symbol(&zone.pair).map(String::from))
}

/// Parse a JSON array of zone objects.
pub fn parse_zones(json: &str) -> Result<Vec<ZoneDefinition>> {
    let zones: Vec<ZoneDefinition> =
        serde_json::from_str(json).context("Failed to parse zone JSON")?;
    let zones: Vec<ZoneDefinition> = zones.into_iter().map(ZoneDefinition::normalized).collect();

    // Cooldown keys are pair + event kind, so these zones mute each other.
    let mut seen = HashSet::new();
    for zone in &zones {
        if !seen.insert(zone.pair.as_str()) {
            warn!(pair = %zone.pair, "Pair configured in more than one zone; alerts share cooldowns");
        }
    }
    Ok(zones)
}

/// Supplies a fresh zone snapshot on every call.
pub trait ZoneSource: Send + Sync {
    fn load(&self) -> Vec<ZoneDefinition>;
}

/// Zones from `ZONES_FILE` (re-read each call) or `ZONES_JSON`,
/// falling back to [`default_zones`].
#[derive(Debug, Clone, Default)]
pub struct ConfigZoneSource {
    json: Option<String>,
    file: Option<PathBuf>,
}

impl ConfigZoneSource {
    pub fn new(json: Option<String>, file: Option<PathBuf>) -> Self {
        Self { json, file }
    }

    fn try_load(&self) -> Result<Option<Vec<ZoneDefinition>>> {
        if let Some(path) = &self.file {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read zones file: {}", path.display()))?;
            return parse_zones(&contents).map(Some);
        }
        match self.json.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => parse_zones(json).map(Some),
            _ => Ok(None),
        }
    }
}

impl ZoneSource for ConfigZoneSource {
    fn load(&self) -> Vec<ZoneDefinition> {
        match self.try_load() {
            Ok(Some(zones)) => zones,
            Ok(None) => default_zones(),
            Err(e) => {
                warn!(error = format!("{e:#}"), "Zone configuration invalid, using default zones");
                default_zones()
            }
        }
    }
}

/// Fixed zone list. Useful for tests and embedding.
#[derive(Debug, Clone)]
pub struct StaticZoneSource(pub Vec<ZoneDefinition>);

impl ZoneSource for StaticZoneSource {
    fn load(&self) -> Vec<ZoneDefinition> {
        self.0.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
