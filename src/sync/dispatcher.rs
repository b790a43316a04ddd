//! Mutation dispatch: validate, then write through to the store.
//!
//! The local views are not touched here. They catch up when the store pushes
//! the post-write snapshot.

use serde::Serialize;
use serde_json::Value;

use super::session::SyncSession;
use crate::errors::AppError;
use crate::models::{AlertDraft, BannerDraft, Collection, Fields, BANNER_ID};
use crate::store::Precondition;

/// Result of flipping an alert's visibility.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub id: String,
    pub is_active: bool,
}

impl ToggleOutcome {
    pub fn title(&self) -> &'static str {
        if self.is_active {
            "Alert Activated"
        } else {
            "Alert Deactivated"
        }
    }

    pub fn description(&self) -> &'static str {
        if self.is_active {
            "Alert has been published to the website."
        } else {
            "Alert has been hidden from the website."
        }
    }
}

impl SyncSession {
    /// Create an alert. Returns the store-assigned id.
    ///
    /// On success the alert form is reset; on failure it keeps `draft`.
    pub async fn create_alert(&self, draft: AlertDraft) -> Result<String, AppError> {
        let fields = match draft.validate().and_then(|f| f.into_fields()) {
            Ok(fields) => fields,
            Err(e) => return Err(self.keep_form(draft, e)),
        };

        match self.store.create(Collection::Alerts, fields).await {
            Ok(id) => {
                self.reset_alert_form();
                tracing::info!(alert_id = %id, "Alert created");
                Ok(id)
            }
            Err(e) => {
                tracing::warn!("Failed to create alert: {}", e);
                Err(self.keep_form(draft, e))
            }
        }
    }

    /// Replace an alert's editable fields.
    pub async fn update_alert(&self, id: &str, draft: AlertDraft) -> Result<(), AppError> {
        let fields = match draft.validate().and_then(|f| f.into_fields()) {
            Ok(fields) => fields,
            Err(e) => return Err(self.keep_form(draft, e)),
        };

        match self
            .store
            .update(Collection::Alerts, id, fields, None)
            .await
        {
            Ok(()) => {
                self.reset_alert_form();
                tracing::info!(alert_id = %id, "Alert updated");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(alert_id = %id, "Failed to update alert: {}", e);
                Err(self.keep_form(draft, e))
            }
        }
    }

    /// Delete an alert. Irreversible; confirmation happens before this call.
    pub async fn delete_alert(&self, id: &str) -> Result<(), AppError> {
        self.store
            .delete(Collection::Alerts, id)
            .await
            .inspect_err(|e| tracing::warn!(alert_id = %id, "Failed to delete alert: {}", e))?;
        tracing::info!(alert_id = %id, "Alert deleted");
        Ok(())
    }

    /// Flip `isActive` using the cached version as a write precondition.
    ///
    /// A stale cache yields [`AppError::Conflict`]; wait for the next push and
    /// retry.
    pub async fn toggle_alert(&self, id: &str) -> Result<ToggleOutcome, AppError> {
        let alert = self
            .alerts
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", id)))?;

        let is_active = !alert.is_active;
        let mut fields = Fields::new();
        fields.insert("isActive".to_string(), Value::Bool(is_active));

        self.store
            .update(
                Collection::Alerts,
                id,
                fields,
                Some(Precondition::Version(alert.version)),
            )
            .await
            .inspect_err(|e| tracing::warn!(alert_id = %id, "Failed to toggle alert: {}", e))?;

        tracing::info!(alert_id = %id, is_active, "Alert toggled");
        Ok(ToggleOutcome {
            id: id.to_string(),
            is_active,
        })
    }

    /// Create or update the banner singleton. Returns its id.
    pub async fn save_banner(&self, draft: BannerDraft) -> Result<String, AppError> {
        let fields = draft.validate()?.into_fields()?;

        let id = match self.banner() {
            Some(existing) => {
                self.store
                    .update(Collection::Banner, &existing.id, fields, None)
                    .await
                    .inspect_err(|e| tracing::warn!("Failed to update banner: {}", e))?;
                existing.id
            }
            None => {
                self.store
                    .upsert(Collection::Banner, BANNER_ID, fields)
                    .await
                    .inspect_err(|e| tracing::warn!("Failed to create banner: {}", e))?;
                BANNER_ID.to_string()
            }
        };

        tracing::info!(banner_id = %id, "Banner saved");
        Ok(id)
    }

    fn keep_form(&self, draft: AlertDraft, error: AppError) -> AppError {
        *self.alert_form.lock() = draft;
        error
    }
}
