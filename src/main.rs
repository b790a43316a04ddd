//! Utility Notices server
//!
//! Serves the public alert feed and the admin console API.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use utility_notices::auth::{AuthProvider, MemoryAuth};
use utility_notices::config::{Config, StoreKind};
use utility_notices::store::{ContentStore, MemoryStore, SqliteStore};
use utility_notices::sync::{PublicFeed, SyncSession};
use utility_notices::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Utility Notices");
    tracing::info!("Store: {:?}", config.store);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize content store
    let store: Arc<dyn ContentStore> = match config.store {
        StoreKind::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            Arc::new(SqliteStore::open(&config.db_path).await?)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; content is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Admin accounts
    let auth: Arc<dyn AuthProvider> = match config.admin_credentials() {
        Some((email, password)) => Arc::new(MemoryAuth::with_admin(email, password)),
        None => {
            tracing::warn!(
                "No admin credentials configured (NOTICES_ADMIN_EMAIL / NOTICES_ADMIN_PASSWORD). Admin console is disabled!"
            );
            Arc::new(MemoryAuth::disabled())
        }
    };

    // Live views
    let session = Arc::new(SyncSession::open(store.clone()).await?);
    let public = Arc::new(PublicFeed::open(store.as_ref()).await?);
    tracing::info!(
        alerts = session.alerts().len(),
        revision = session.revision(),
        "Content loaded"
    );

    let state = AppState {
        session: session.clone(),
        public: public.clone(),
        auth,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    public.close();
    session.close();
    tracing::info!("Shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
