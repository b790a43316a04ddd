//! Admin console overview tab.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::models::Alert;
use crate::sync::{Overview, RECENT_ALERTS};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleOverview {
    #[serde(flatten)]
    pub overview: Overview,
    pub banner_label: &'static str,
    pub recent_alerts: Vec<Alert>,
}

/// GET /api/admin/overview - Counters and the most recent alerts.
pub async fn get_overview(State(state): State<AppState>) -> ApiResult<ConsoleOverview> {
    let overview = state.session.overview();

    success(
        ConsoleOverview {
            banner_label: overview.banner_status.label(),
            recent_alerts: state.session.recent_alerts(RECENT_ALERTS),
            overview,
        },
        state.session.revision(),
    )
}
