//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::{resolve_feed_symbol, Settings, ZoneSource};
use crate::engine::scheduler::{MonitorSnapshot, MonitorState};
use crate::types::ZoneDefinition;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers. Read-only.
pub struct DashboardState {
    pub monitor: Arc<MonitorState>,
    pub zones: Arc<dyn ZoneSource>,
    pub settings: SettingsView,
}

impl DashboardState {
    pub fn new(monitor: Arc<MonitorState>, zones: Arc<dyn ZoneSource>, settings: &Settings) -> Self {
        Self {
            monitor,
            zones,
            settings: SettingsView::from(settings),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Non-secret settings.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub channel_id: String,
    pub interval_secs: u64,
    pub cooldown_secs: u64,
    pub heartbeat_secs: u64,
}

impl From<&Settings> for SettingsView {
    fn from(s: &Settings) -> Self {
        Self {
            channel_id: s.channel_id.clone(),
            interval_secs: s.interval.as_secs(),
            cooldown_secs: s.cooldown.as_secs(),
            heartbeat_secs: s.heartbeat.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub settings: SettingsView,
    pub uptime_secs: i64,
    #[serde(flatten)]
    pub monitor: MonitorSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneView {
    #[serde(flatten)]
    pub zone: ZoneDefinition,
    pub resolved_symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CooldownEntry {
    pub key: String,
    pub last_alert: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let monitor = state.monitor.snapshot().await;
    let uptime = (Utc::now() - monitor.started_at).num_seconds();
    Json(StatusResponse {
        settings: state.settings.clone(),
        uptime_secs: uptime,
        monitor,
    })
}

/// GET /api/zones
pub async fn get_zones(State(state): State<AppState>) -> Json<Vec<ZoneView>> {
    let zones = state
        .zones
        .load()
        .into_iter()
        .map(|zone| ZoneView {
            resolved_symbol: resolve_feed_symbol(&zone),
            zone,
        })
        .collect();
    Json(zones)
}

/// GET /api/cooldowns
pub async fn get_cooldowns(State(state): State<AppState>) -> Json<Vec<CooldownEntry>> {
    let entries = state
        .monitor
        .registry
        .snapshot()
        .into_iter()
        .map(|(key, last_alert)| CooldownEntry { key, last_alert })
        .collect();
    Json(entries)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}
