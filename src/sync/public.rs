//! Public-facing feed: active alerts and the banner, as a site visitor sees them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::live_view::LiveView;
use crate::errors::AppError;
use crate::models::{Alert, Banner, Collection, Filter};
use crate::store::ContentStore;
use crate::subscription::Subscription;

/// Visitor view of the content.
///
/// Active alerts come from a store-side filtered subscription, independent of
/// any admin session. Banner dismissal lives only as long as this feed.
pub struct PublicFeed {
    alerts: Arc<LiveView<Alert>>,
    banner: Arc<LiveView<Banner>>,
    subscriptions: Vec<Subscription>,
    banner_dismissed: AtomicBool,
}

impl PublicFeed {
    pub async fn open(store: &dyn ContentStore) -> Result<Self, AppError> {
        let (alerts, alerts_sub) = LiveView::<Alert>::attach(
            store,
            Collection::Alerts,
            Filter::eq("isActive", true),
        )
        .await?;
        let (banner, banner_sub) =
            LiveView::<Banner>::attach(store, Collection::Banner, Filter::All).await?;

        tracing::debug!(alerts = alerts.len(), "Public feed opened");

        Ok(Self {
            alerts,
            banner,
            subscriptions: vec![alerts_sub, banner_sub],
            banner_dismissed: AtomicBool::new(false),
        })
    }

    pub fn close(&self) {
        for subscription in &self.subscriptions {
            subscription.cancel();
        }
    }

    /// Alerts currently published to the website, newest first.
    pub fn public_alerts(&self) -> Vec<Alert> {
        self.alerts.items()
    }

    /// The banner if it is switched on, regardless of dismissal.
    pub fn active_banner(&self) -> Option<Banner> {
        self.banner.first().filter(|b| b.is_active)
    }

    /// Banner exists, is active, and this viewer has not dismissed it.
    pub fn banner_visible(&self) -> bool {
        self.visible_banner().is_some()
    }

    pub fn visible_banner(&self) -> Option<Banner> {
        if self.banner_dismissed.load(Ordering::SeqCst) {
            return None;
        }
        self.active_banner()
    }

    /// Hide the banner for the rest of this feed's life. Not persisted.
    pub fn dismiss_banner(&self) {
        self.banner_dismissed.store(true, Ordering::SeqCst);
    }

    pub fn revision(&self) -> i64 {
        self.alerts.revision().max(self.banner.revision())
    }

    pub fn is_stale(&self) -> bool {
        self.alerts.is_stale() || self.banner.is_stale()
    }
}
