//! Website endpoints. No authentication.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::models::Alert;
use crate::AppState;

/// An active alert as rendered on the website.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAlert {
    #[serde(flatten)]
    pub alert: Alert,
    pub type_label: &'static str,
    pub date_range: String,
}

impl From<Alert> for PublicAlert {
    fn from(alert: Alert) -> Self {
        Self {
            type_label: alert.alert_type.label(),
            date_range: alert.date_range_label(),
            alert,
        }
    }
}

/// Active alerts plus whether the feed behind them is broken.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAlerts {
    pub alerts: Vec<PublicAlert>,
    pub stale: bool,
}

/// The banner, if switched on, plus whether the feed behind it is broken.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicBannerView {
    pub banner: Option<PublicBanner>,
    pub stale: bool,
}

/// The site-wide banner with display defaults applied.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicBanner {
    pub message: String,
    pub font_size: String,
    pub font_weight: String,
}

/// GET /api/public/alerts - Active alerts, newest first.
pub async fn public_alerts(State(state): State<AppState>) -> ApiResult<PublicAlerts> {
    let revision_id = state.public.revision();
    let alerts = state
        .public
        .public_alerts()
        .into_iter()
        .map(PublicAlert::from)
        .collect();
    success(
        PublicAlerts {
            alerts,
            stale: state.public.is_stale(),
        },
        revision_id,
    )
}

/// GET /api/public/banner - The banner if switched on; `banner` is null otherwise.
///
/// Dismissal is a per-visitor concern and is left to the client.
pub async fn public_banner(State(state): State<AppState>) -> ApiResult<PublicBannerView> {
    let revision_id = state.public.revision();
    let banner = state.public.active_banner().map(|b| PublicBanner {
        font_size: b.font_size().to_string(),
        font_weight: b.font_weight().to_string(),
        message: b.message,
    });
    success(
        PublicBannerView {
            banner,
            stale: state.public.is_stale(),
        },
        revision_id,
    )
}
