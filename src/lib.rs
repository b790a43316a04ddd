//! Utility Notices
//!
//! Live-synchronized alert and banner content for a water utility website,
//! backed by a pluggable content store and served over a small REST API.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod store;
pub mod subscription;
pub mod sync;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::AuthProvider;
use sync::{PublicFeed, SyncSession};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SyncSession>,
    pub public: Arc<PublicFeed>,
    pub auth: Arc<dyn AuthProvider>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Console routes, bearer token required
    let admin_routes = Router::new()
        .route("/auth/logout", post(api::logout))
        .route("/auth/me", get(api::whoami))
        .route("/admin/overview", get(api::get_overview))
        .route("/admin/alerts", get(api::list_alerts).post(api::create_alert))
        .route(
            "/admin/alerts/{id}",
            get(api::get_alert)
                .put(api::update_alert)
                .delete(api::delete_alert),
        )
        .route("/admin/alerts/{id}/toggle", post(api::toggle_alert))
        .route("/admin/banner", get(api::get_banner))
        .route("/admin/banner", put(api::save_banner))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let api_routes = Router::new()
        .route("/public/alerts", get(api::public_alerts))
        .route("/public/banner", get(api::public_banner))
        .route("/auth/login", post(api::login))
        .merge(admin_routes);

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
