//! Admin sync session: the owned pair of live views behind the console.

use std::sync::Arc;

use parking_lot::Mutex;

use super::live_view::LiveView;
use crate::errors::AppError;
use crate::models::{Alert, AlertDraft, Banner, BannerDraft, Collection};
use crate::store::ContentStore;
use crate::subscription::Subscription;

/// Live views of the `alerts` and `banner` collections plus the mutation
/// dispatcher that writes through to the store.
///
/// Acquire with [`SyncSession::open`] when the console mounts and release with
/// [`SyncSession::close`] (or by dropping it) when it unmounts.
pub struct SyncSession {
    pub(super) store: Arc<dyn ContentStore>,
    pub(super) alerts: Arc<LiveView<Alert>>,
    pub(super) banner: Arc<LiveView<Banner>>,
    subscriptions: Vec<Subscription>,
    /// Alert form state kept across failed submissions
    pub(super) alert_form: Mutex<AlertDraft>,
}

impl SyncSession {
    /// Open one live subscription per collection.
    pub async fn open(store: Arc<dyn ContentStore>) -> Result<Self, AppError> {
        let alerts = LiveView::new(Collection::Alerts);
        let alerts_sub = store
            .subscribe(Collection::Alerts, alerts.callback())
            .await?;

        let banner = LiveView::new(Collection::Banner);
        let banner_sub = store
            .subscribe(Collection::Banner, banner.callback())
            .await?;

        tracing::info!(
            alerts = alerts.len(),
            banner = banner.len(),
            "Sync session opened"
        );

        Ok(Self {
            store,
            alerts,
            banner,
            subscriptions: vec![alerts_sub, banner_sub],
            alert_form: Mutex::new(AlertDraft::default()),
        })
    }

    /// Cancel both subscriptions. Idempotent.
    pub fn close(&self) {
        if self.is_open() {
            tracing::info!("Sync session closed");
        }
        for subscription in &self.subscriptions {
            subscription.cancel();
        }
    }

    pub fn is_open(&self) -> bool {
        self.subscriptions.iter().any(Subscription::is_active)
    }

    /// All cached alerts, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.items()
    }

    pub fn alert(&self, id: &str) -> Option<Alert> {
        self.alerts.get(id)
    }

    /// The authoritative banner, if one exists.
    pub fn banner(&self) -> Option<Banner> {
        self.banner.first()
    }

    /// Highest store revision seen by either view.
    pub fn revision(&self) -> i64 {
        self.alerts.revision().max(self.banner.revision())
    }

    /// Whether either live view has broken since its last good push.
    pub fn is_stale(&self) -> bool {
        self.alerts.is_stale() || self.banner.is_stale()
    }

    pub fn subscription_error(&self) -> Option<AppError> {
        self.alerts.last_error().or_else(|| self.banner.last_error())
    }

    /// Current alert form state.
    pub fn alert_form(&self) -> AlertDraft {
        self.alert_form.lock().clone()
    }

    /// Load a cached alert into the form for editing.
    pub fn edit_alert(&self, id: &str) -> Result<AlertDraft, AppError> {
        let alert = self
            .alerts
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", id)))?;
        let draft = AlertDraft::from(&alert);
        *self.alert_form.lock() = draft.clone();
        Ok(draft)
    }

    /// Discard the alert form.
    pub fn reset_alert_form(&self) {
        *self.alert_form.lock() = AlertDraft::default();
    }

    /// Banner form seeded from the cached banner, defaults applied.
    pub fn banner_form(&self) -> BannerDraft {
        self.banner()
            .map(|b| BannerDraft::from(&b))
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("alerts", &self.alerts.len())
            .field("banner", &self.banner.len())
            .field("revision", &self.revision())
            .field("open", &self.is_open())
            .finish()
    }
}
