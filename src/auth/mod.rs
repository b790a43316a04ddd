//! Email/password authentication for the admin console.
//!
//! The sync engine never checks identity itself. Admin routes are gated by the
//! [`require_admin`] middleware, which resolves bearer tokens issued here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::errors::{codes, AppError, ErrorDetails, ErrorResponse};
use crate::subscription::Subscription;
use crate::AppState;

/// A signed-in administrator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

impl Identity {
    /// Local part of the email, used in the console greeting.
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// A bearer token bound to an identity.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub identity: Identity,
}

/// Receives the current identity on every sign-in and sign-out.
pub type AuthCallback = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError>;

    /// Resolve a bearer token to its identity.
    async fn identify(&self, token: &str) -> Option<Identity>;

    async fn sign_out(&self, token: &str) -> Result<(), AppError>;

    /// Watch sign-in state. Fires once immediately with the current identity.
    fn on_auth_change(&self, callback: AuthCallback) -> Subscription;

    /// Whether any account can sign in at all.
    fn is_enabled(&self) -> bool;
}

struct Account {
    uid: String,
    email: String,
    password: String,
}

type Listeners = Mutex<Vec<(u64, AuthCallback)>>;

/// In-process [`AuthProvider`] holding configured admin accounts.
pub struct MemoryAuth {
    accounts: Vec<Account>,
    sessions: RwLock<HashMap<String, Identity>>,
    current: Mutex<Option<Identity>>,
    listeners: Arc<Listeners>,
    next_listener: AtomicU64,
}

impl MemoryAuth {
    /// Provider with no accounts; every sign-in is refused.
    pub fn disabled() -> Self {
        Self {
            accounts: Vec::new(),
            sessions: RwLock::new(HashMap::new()),
            current: Mutex::new(None),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn with_admin(email: impl Into<String>, password: impl Into<String>) -> Self {
        let mut auth = Self::disabled();
        auth.accounts.push(Account {
            uid: uuid::Uuid::new_v4().to_string(),
            email: email.into(),
            password: password.into(),
        });
        auth
    }

    fn notify(&self, identity: Option<Identity>) {
        *self.current.lock() = identity.clone();
        let listeners: Vec<AuthCallback> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for listener in listeners {
            listener(identity.clone());
        }
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        if !self.is_enabled() {
            return Err(AppError::Unauthorized(
                "Admin console is disabled".to_string(),
            ));
        }

        let account = self.accounts.iter().find(|a| {
            a.email.eq_ignore_ascii_case(email.trim())
                && constant_time_compare(&a.password, password)
        });

        let Some(account) = account else {
            tracing::warn!("Failed admin sign-in attempt");
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        };

        let identity = Identity {
            uid: account.uid.clone(),
            email: account.email.clone(),
        };
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.write().insert(token.clone(), identity.clone());
        tracing::info!(uid = %identity.uid, "Administrator signed in");

        self.notify(Some(identity.clone()));
        Ok(AuthSession { token, identity })
    }

    async fn identify(&self, token: &str) -> Option<Identity> {
        self.sessions.read().get(token).cloned()
    }

    async fn sign_out(&self, token: &str) -> Result<(), AppError> {
        let removed = self.sessions.write().remove(token);
        match removed {
            Some(identity) => {
                tracing::info!(uid = %identity.uid, "Administrator signed out");
                self.notify(None);
                Ok(())
            }
            None => Err(AppError::Unauthorized(
                "Invalid or expired session".to_string(),
            )),
        }
    }

    fn on_auth_change(&self, callback: AuthCallback) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, callback.clone()));
        let current = self.current.lock().clone();
        callback(current);

        let listeners = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.lock().retain(|(lid, _)| *lid != id);
            }
        })
    }

    fn is_enabled(&self) -> bool {
        !self.accounts.is_empty()
    }
}

/// Identity and token of the caller, inserted by [`require_admin`].
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub identity: Identity,
    pub token: String,
}

/// Middleware for admin routes: requires a valid `Authorization: Bearer` token.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return unauthorized_response("Missing bearer token");
    };

    match state.auth.identify(&token).await {
        Some(identity) => {
            request
                .extensions_mut()
                .insert(AdminContext { identity, token });
            next.run(request).await
        }
        None => unauthorized_response("Invalid or expired session"),
    }
}

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Create an unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
        revision_id: 0,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
