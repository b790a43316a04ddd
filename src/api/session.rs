//! Admin sign-in endpoints.

use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiJson, ApiResult};
use crate::auth::{AdminContext, Identity};
use crate::errors::AppError;
use crate::AppState;

/// Request body for signing in.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// A fresh bearer token and who it belongs to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
    pub display_name: String,
}

/// The signed-in administrator.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmI {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

impl From<Identity> for WhoAmI {
    fn from(identity: Identity) -> Self {
        Self {
            display_name: identity.display_name().to_string(),
            uid: identity.uid,
            email: identity.email,
        }
    }
}

/// POST /api/auth/login - Exchange email and password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let revision_id = state.session.revision();

    if request.email.trim().is_empty() || request.password.is_empty() {
        return error(
            AppError::Validation("Email and password are required".to_string()),
            revision_id,
        );
    }

    match state.auth.sign_in(&request.email, &request.password).await {
        Ok(session) => success(
            LoginResponse {
                display_name: session.identity.display_name().to_string(),
                email: session.identity.email,
                token: session.token,
            },
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/auth/logout - Revoke the caller's token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
) -> ApiResult<()> {
    let revision_id = state.session.revision();

    match state.auth.sign_out(&admin.token).await {
        Ok(()) => success((), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/auth/me - The caller's identity.
pub async fn whoami(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
) -> ApiResult<WhoAmI> {
    success(WhoAmI::from(admin.identity), state.session.revision())
}
