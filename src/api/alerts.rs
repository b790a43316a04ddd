//! Admin alert endpoints.

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiJson, ApiResult};
use crate::errors::AppError;
use crate::models::{Alert, AlertDraft};
use crate::AppState;

/// Request body for creating or editing an alert.
///
/// Every field tolerates `null`; missing text fields fail validation rather
/// than deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub alert_type: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl AlertRequest {
    /// Form draft for this request. `is_active` applies when the body leaves
    /// `isActive` out.
    pub fn into_draft(self, is_active: bool) -> AlertDraft {
        AlertDraft {
            title: self.title.unwrap_or_default(),
            message: self.message.unwrap_or_default(),
            alert_type: self.alert_type.unwrap_or_default(),
            is_active: self.is_active.unwrap_or(is_active),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// Alerts split the way the console lists them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertListing {
    pub active: Vec<Alert>,
    pub inactive: Vec<Alert>,
    pub total: usize,
}

/// Id of a written alert, plus the alert once the live view has caught up.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSaved {
    pub id: String,
    pub alert: Option<Alert>,
}

/// Toast shown after flipping visibility.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleNotice {
    pub id: String,
    pub is_active: bool,
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: String,
}

/// GET /api/admin/alerts - All alerts, newest first, split by visibility.
pub async fn list_alerts(State(state): State<AppState>) -> ApiResult<AlertListing> {
    let revision_id = state.session.revision();
    let active = state.session.active_alerts();
    let inactive = state.session.inactive_alerts();
    let total = active.len() + inactive.len();

    success(
        AlertListing {
            active,
            inactive,
            total,
        },
        revision_id,
    )
}

/// GET /api/admin/alerts/{id} - A single cached alert.
pub async fn get_alert(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Alert> {
    let revision_id = state.session.revision();

    match state.session.alert(&id) {
        Some(alert) => success(alert, revision_id),
        None => error(
            AppError::NotFound(format!("Alert {} not found", id)),
            revision_id,
        ),
    }
}

/// POST /api/admin/alerts - Create an alert.
pub async fn create_alert(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AlertRequest>,
) -> ApiResult<AlertSaved> {
    let revision_id = state.session.revision();
    let draft = request.into_draft(true);

    match state.session.create_alert(draft).await {
        Ok(id) => {
            let alert = state.session.alert(&id);
            success(AlertSaved { id, alert }, state.session.revision())
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/admin/alerts/{id} - Replace an alert's editable fields.
pub async fn update_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AlertRequest>,
) -> ApiResult<AlertSaved> {
    let revision_id = state.session.revision();
    // Leaving out isActive keeps the alert's current visibility
    let current = state.session.alert(&id).map_or(true, |a| a.is_active);
    let draft = request.into_draft(current);

    match state.session.update_alert(&id, draft).await {
        Ok(()) => {
            let alert = state.session.alert(&id);
            success(AlertSaved { id, alert }, state.session.revision())
        }
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/admin/alerts/{id}?confirm=true - Permanently delete an alert.
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<Deleted> {
    let revision_id = state.session.revision();

    if !params.confirm {
        return error(
            AppError::BadRequest(
                "Deleting an alert cannot be undone; repeat with confirm=true".to_string(),
            ),
            revision_id,
        );
    }

    match state.session.delete_alert(&id).await {
        Ok(()) => success(Deleted { id }, state.session.revision()),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/alerts/{id}/toggle - Publish or hide an alert.
pub async fn toggle_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ToggleNotice> {
    let revision_id = state.session.revision();

    match state.session.toggle_alert(&id).await {
        Ok(outcome) => success(
            ToggleNotice {
                title: outcome.title(),
                description: outcome.description(),
                id: outcome.id,
                is_active: outcome.is_active,
            },
            state.session.revision(),
        ),
        Err(e) => error(e, revision_id),
    }
}
