//! Sync engine: live views over the content store, mutation dispatch, and the
//! projections the website renders.

mod dispatcher;
mod live_view;
mod projection;
mod public;
mod session;

pub use dispatcher::ToggleOutcome;
pub use live_view::{LiveView, ViewRecord};
pub use projection::{
    active_alerts, date_range_label, format_timestamp, inactive_alerts, partition_alerts,
    BannerStatus, Overview, RECENT_ALERTS,
};
pub use public::PublicFeed;
pub use session::SyncSession;
