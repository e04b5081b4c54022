// ── Dashboard snapshot ──
//
// Latest server stats plus the display helpers the overview needs.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use dashwire_api::{DashboardStats, Gateway};
use tokio::sync::watch;
use tracing::debug;

use crate::error::CoreError;

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;
const MONTH: i64 = 2_592_000;
const YEAR: i64 = 31_536_000;

/// Latest [`DashboardStats`], `None` until the first successful load.
#[derive(Debug, Clone)]
pub struct DashboardStore {
    stats: Arc<watch::Sender<Option<DashboardStats>>>,
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardStore {
    pub fn new() -> Self {
        let (stats, _) = watch::channel(None);
        Self {
            stats: Arc::new(stats),
        }
    }

    pub fn set(&self, stats: DashboardStats) {
        self.stats.send_replace(Some(stats));
    }

    /// Forget the snapshot (on logout).
    pub fn reset(&self) {
        self.stats.send_if_modified(|current| current.take().is_some());
    }

    pub fn snapshot(&self) -> Option<DashboardStats> {
        self.stats.borrow().clone()
    }

    pub fn is_available(&self) -> bool {
        self.stats.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DashboardStats>> {
        self.stats.subscribe()
    }

    /// Fetch fresh stats and store them.
    pub async fn load(&self, gateway: &Gateway) -> Result<DashboardStats, CoreError> {
        let stats = gateway.dashboard_stats().await?;
        debug!(memory_percent = stats.memory_percent, "dashboard stats loaded");
        self.set(stats.clone());
        Ok(stats)
    }
}

// ── Display helpers ─────────────────────────────────────────────────

/// Time since `start_time` (Unix seconds), as at most two units.
///
/// Units are taken largest first and zero units are skipped, so one day and
/// five minutes reads `1d 5m`. Months are 30 days and years 365.
pub fn format_uptime(start_time: i64, now: DateTime<Utc>) -> String {
    let diff = (now.timestamp() - start_time).max(0);

    let units = [
        (diff / YEAR, "y"),
        ((diff / MONTH) % 12, "mo"),
        ((diff / DAY) % 30, "d"),
        ((diff / HOUR) % 24, "h"),
        ((diff / MINUTE) % 60, "m"),
    ];

    let mut parts: Vec<String> = units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();

    let seconds = diff % 60;
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }

    parts.truncate(2);
    parts.join(" ")
}

/// `YYYY/MM/DD HH:MM:SS` in the host's local time zone.
pub fn format_start_time(start_time: i64) -> String {
    match Local.timestamp_opt(start_time, 0).single() {
        Some(local) => local.format("%Y/%m/%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}
