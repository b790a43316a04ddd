//! Read-only projections over the local views.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::session::SyncSession;
use crate::models::{Alert, Banner};

/// How many alerts the console overview lists.
pub const RECENT_ALERTS: usize = 3;

/// Banner state as shown on the console overview.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BannerStatus {
    Active,
    Inactive,
    NotCreated,
}

impl BannerStatus {
    pub fn of(banner: Option<&Banner>) -> Self {
        match banner {
            Some(b) if b.is_active => BannerStatus::Active,
            Some(_) => BannerStatus::Inactive,
            None => BannerStatus::NotCreated,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BannerStatus::Active => "Active",
            BannerStatus::Inactive | BannerStatus::NotCreated => "Inactive",
        }
    }
}

/// Counters for the console overview tab.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub active_alerts: usize,
    pub inactive_alerts: usize,
    pub total_alerts: usize,
    pub banner_status: BannerStatus,
    pub stale: bool,
}

/// Split alerts by visibility, keeping order.
pub fn partition_alerts(alerts: &[Alert]) -> (Vec<Alert>, Vec<Alert>) {
    alerts.iter().cloned().partition(|a| a.is_active)
}

pub fn active_alerts(alerts: &[Alert]) -> Vec<Alert> {
    alerts.iter().filter(|a| a.is_active).cloned().collect()
}

pub fn inactive_alerts(alerts: &[Alert]) -> Vec<Alert> {
    alerts.iter().filter(|a| !a.is_active).cloned().collect()
}

/// "January 5, 2025 - January 7, 2025", or just the start when there is no end.
pub fn date_range_label(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    const FORMAT: &str = "%B %-d, %Y";
    match (start, end) {
        (Some(start), Some(end)) => format!("{} - {}", start.format(FORMAT), end.format(FORMAT)),
        (Some(start), None) => start.format(FORMAT).to_string(),
        (None, _) => String::new(),
    }
}

/// "Jan 5, 2025, 09:30 AM" in UTC, or "N/A".
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%b %-d, %Y, %I:%M %p").to_string(),
        None => "N/A".to_string(),
    }
}

impl Alert {
    pub fn date_range_label(&self) -> String {
        date_range_label(self.start_date, self.end_date)
    }
}

impl SyncSession {
    pub fn active_alerts(&self) -> Vec<Alert> {
        active_alerts(&self.alerts())
    }

    pub fn inactive_alerts(&self) -> Vec<Alert> {
        inactive_alerts(&self.alerts())
    }

    /// The `n` newest alerts.
    pub fn recent_alerts(&self, n: usize) -> Vec<Alert> {
        self.alerts().into_iter().take(n).collect()
    }

    pub fn overview(&self) -> Overview {
        let alerts = self.alerts();
        let (active, inactive) = partition_alerts(&alerts);
        Overview {
            active_alerts: active.len(),
            inactive_alerts: inactive.len(),
            total_alerts: alerts.len(),
            banner_status: BannerStatus::of(self.banner().as_ref()),
            stale: self.is_stale(),
        }
    }
}
