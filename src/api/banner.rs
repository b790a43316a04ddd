//! Admin banner endpoints.

use axum::extract::State;
use serde::Serialize;

use super::{error, success, ApiJson, ApiResult};
use crate::models::{Banner, BannerDraft};
use crate::sync::BannerStatus;
use crate::AppState;

/// The stored banner and the form the console should show for it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerState {
    pub banner: Option<Banner>,
    pub status: BannerStatus,
    pub form: BannerDraft,
}

fn banner_state(state: &AppState) -> BannerState {
    let banner = state.session.banner();
    BannerState {
        status: BannerStatus::of(banner.as_ref()),
        form: state.session.banner_form(),
        banner,
    }
}

/// GET /api/admin/banner - Current banner and its form.
pub async fn get_banner(State(state): State<AppState>) -> ApiResult<BannerState> {
    success(banner_state(&state), state.session.revision())
}

/// PUT /api/admin/banner - Create or update the banner.
pub async fn save_banner(
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<BannerDraft>,
) -> ApiResult<BannerState> {
    let revision_id = state.session.revision();

    match state.session.save_banner(draft).await {
        Ok(_) => success(banner_state(&state), state.session.revision()),
        Err(e) => error(e, revision_id),
    }
}
