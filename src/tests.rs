//! Integration tests for the notices API.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::auth::{AuthProvider, MemoryAuth};
use crate::config::{Config, StoreKind};
use crate::models::Collection;
use crate::store::{ContentStore, MemoryStore, SqliteStore};
use crate::sync::{PublicFeed, SyncSession};
use crate::{create_router, AppState};

const ADMIN_EMAIL: &str = "ops@westprairie.example";
const ADMIN_PASSWORD: &str = "correct-horse";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    token: Option<String>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let mut fixture = Self::with_store(StoreKind::Sqlite, true).await;
        fixture.token = Some(fixture.login(ADMIN_EMAIL, ADMIN_PASSWORD).await);
        fixture
    }

    async fn with_store(kind: StoreKind, admin_enabled: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let store: Arc<dyn ContentStore> = match kind {
            StoreKind::Sqlite => Arc::new(
                SqliteStore::open(&db_path)
                    .await
                    .expect("Failed to open store"),
            ),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };

        let config = Config {
            store: kind,
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            admin_email: admin_enabled.then(|| ADMIN_EMAIL.to_string()),
            admin_password: admin_enabled.then(|| ADMIN_PASSWORD.to_string()),
        };

        let auth: Arc<dyn AuthProvider> = match config.admin_credentials() {
            Some((email, password)) => Arc::new(MemoryAuth::with_admin(email, password)),
            None => Arc::new(MemoryAuth::disabled()),
        };

        let state = AppState {
            session: Arc::new(SyncSession::open(store.clone()).await.unwrap()),
            public: Arc::new(PublicFeed::open(store.as_ref()).await.unwrap()),
            auth,
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            token: None,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["token"].as_str().unwrap().to_string()
    }

    fn admin(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn create_alert(&self, body: Value) -> String {
        let resp = self
            .admin(reqwest::Method::POST, "/api/admin/alerts")
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn get_json(&self, path: &str) -> Value {
        let resp = self
            .admin(reqwest::Method::GET, path)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }
}

fn boil_water_advisory() -> Value {
    json!({
        "title": "Boil Water Advisory",
        "message": "Boil tap water for one minute before drinking.",
        "type": "emergency",
        "isActive": true,
        "startDate": "2025-01-05",
        "endDate": "2025-01-07"
    })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_admin_requires_token() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/alerts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/alerts"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/public/alerts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["alerts"], json!([]));
    assert_eq!(body["data"]["stale"], false);

    let resp = fixture
        .client
        .get(fixture.url("/api/public/banner"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["banner"].is_null());
    assert_eq!(body["data"]["stale"], false);
}

#[tokio::test]
async fn test_login_logout() {
    let fixture = TestFixture::with_store(StoreKind::Memory, true).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": "", "password": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let token = fixture.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["displayName"], "ops");

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(fixture.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_admin_disabled_without_credentials() {
    let fixture = TestFixture::with_store(StoreKind::Memory, false).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_alert_crud() {
    let fixture = TestFixture::new().await;

    // Create
    let resp = fixture
        .admin(reqwest::Method::POST, "/api/admin/alerts")
        .json(&boil_water_advisory())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["alert"]["type"], "emergency");
    assert_eq!(body["data"]["alert"]["version"], 1);
    let revision_after_create = body["revisionId"].as_i64().unwrap();

    // Update
    let mut draft = boil_water_advisory();
    draft["message"] = json!("Advisory lifted for the north zone.");
    draft["endDate"] = json!("");
    let resp = fixture
        .admin(reqwest::Method::PUT, &format!("/api/admin/alerts/{}", id))
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["alert"]["message"], "Advisory lifted for the north zone.");
    assert!(body["data"]["alert"]["endDate"].is_null());
    assert_eq!(body["data"]["alert"]["version"], 2);
    assert!(body["revisionId"].as_i64().unwrap() > revision_after_create);

    // Get
    let body = fixture
        .get_json(&format!("/api/admin/alerts/{}", id))
        .await;
    assert_eq!(body["data"]["title"], "Boil Water Advisory");

    // Delete
    let resp = fixture
        .admin(
            reqwest::Method::DELETE,
            &format!("/api/admin/alerts/{}?confirm=true", id),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Verify deleted
    let resp = fixture
        .admin(reqwest::Method::GET, &format!("/api/admin/alerts/{}", id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .admin(reqwest::Method::PUT, &format!("/api/admin/alerts/{}", id))
        .json(&boil_water_advisory())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_create_alert_validation() {
    let fixture = TestFixture::new().await;

    let mut draft = boil_water_advisory();
    draft["type"] = json!("");
    let resp = fixture
        .admin(reqwest::Method::POST, "/api/admin/alerts")
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["message"],
        "Please fill in all required fields: Title, Message, and Type."
    );
    assert_eq!(body["revisionId"], 0);

    let mut draft = boil_water_advisory();
    draft["endDate"] = json!("2025-01-01");
    let resp = fixture
        .admin(reqwest::Method::POST, "/api/admin/alerts")
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body = fixture.get_json("/api/admin/alerts").await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_delete_requires_confirmation() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_alert(boil_water_advisory()).await;

    let resp = fixture
        .admin(reqwest::Method::DELETE, &format!("/api/admin/alerts/{}", id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let body = fixture.get_json("/api/admin/alerts").await;
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn test_toggle_publishes_and_hides() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_alert(boil_water_advisory()).await;

    let body = fixture.get_json("/api/public/alerts").await;
    assert_eq!(body["data"]["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["alerts"][0]["typeLabel"], "Emergency");
    assert_eq!(
        body["data"]["alerts"][0]["dateRange"],
        "January 5, 2025 - January 7, 2025"
    );

    let resp = fixture
        .admin(
            reqwest::Method::POST,
            &format!("/api/admin/alerts/{}/toggle", id),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["isActive"], false);
    assert_eq!(body["data"]["title"], "Alert Deactivated");

    let body = fixture.get_json("/api/public/alerts").await;
    assert_eq!(body["data"]["alerts"], json!([]));

    let body = fixture.get_json("/api/admin/alerts").await;
    assert_eq!(body["data"]["inactive"][0]["id"], id.as_str());

    let resp = fixture
        .admin(reqwest::Method::POST, "/api/admin/alerts/missing/toggle")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_banner_save_and_public_view() {
    let fixture = TestFixture::new().await;

    let body = fixture.get_json("/api/admin/banner").await;
    assert!(body["data"]["banner"].is_null());
    assert_eq!(body["data"]["status"], "notCreated");
    assert_eq!(body["data"]["form"]["fontSize"], "16px");

    let resp = fixture
        .admin(reqwest::Method::PUT, "/api/admin/banner")
        .json(&json!({ "message": "", "isActive": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    for _ in 0..2 {
        let resp = fixture
            .admin(reqwest::Method::PUT, "/api/admin/banner")
            .json(&json!({
                "message": "Hydrant flushing on Main St tonight",
                "isActive": true,
                "fontSize": "18px"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["banner"]["id"], "current");
        assert_eq!(body["data"]["status"], "active");
    }

    let body = fixture.get_json("/api/public/banner").await;
    let banner = &body["data"]["banner"];
    assert_eq!(banner["message"], "Hydrant flushing on Main St tonight");
    assert_eq!(banner["fontSize"], "18px");
    assert_eq!(banner["fontWeight"], "500");

    let resp = fixture
        .admin(reqwest::Method::PUT, "/api/admin/banner")
        .json(&json!({ "message": "Hydrant flushing on Main St tonight", "isActive": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body = fixture.get_json("/api/public/banner").await;
    assert!(body["data"]["banner"].is_null());
}

#[tokio::test]
async fn test_overview() {
    let fixture = TestFixture::with_store(StoreKind::Memory, true).await;
    let fixture = TestFixture {
        token: Some(fixture.login(ADMIN_EMAIL, ADMIN_PASSWORD).await),
        ..fixture
    };

    for (title, active) in [("First", true), ("Second", false), ("Third", true), ("Fourth", true)] {
        let mut draft = boil_water_advisory();
        draft["title"] = json!(title);
        draft["isActive"] = json!(active);
        fixture.create_alert(draft).await;
    }

    let body = fixture.get_json("/api/admin/overview").await;
    assert_eq!(body["data"]["activeAlerts"], 3);
    assert_eq!(body["data"]["inactiveAlerts"], 1);
    assert_eq!(body["data"]["totalAlerts"], 4);
    assert_eq!(body["data"]["bannerStatus"], "notCreated");
    assert_eq!(body["data"]["bannerLabel"], "Inactive");
    assert_eq!(body["data"]["stale"], false);

    let recent: Vec<&str> = body["data"]["recentAlerts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(recent, vec!["Fourth", "Third", "Second"]);
}

#[tokio::test]
async fn test_null_alert_fields_are_validation_errors() {
    let fixture = TestFixture::new().await;

    for field in ["type", "title", "message"] {
        let mut draft = boil_water_advisory();
        draft[field] = Value::Null;
        let resp = fixture
            .admin(reqwest::Method::POST, "/api/admin/alerts")
            .json(&draft)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "null {}", field);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    // null isActive falls back to the default
    let mut draft = boil_water_advisory();
    draft["isActive"] = Value::Null;
    let resp = fixture
        .admin(reqwest::Method::POST, "/api/admin/alerts")
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["alert"]["isActive"], true);
}

#[tokio::test]
async fn test_update_without_is_active_keeps_alert_hidden() {
    let fixture = TestFixture::new().await;

    let mut draft = boil_water_advisory();
    draft["isActive"] = json!(false);
    let id = fixture.create_alert(draft).await;

    let mut edit = boil_water_advisory();
    edit.as_object_mut().unwrap().remove("isActive");
    edit["message"] = json!("Advisory extended through the weekend.");
    let resp = fixture
        .admin(reqwest::Method::PUT, &format!("/api/admin/alerts/{}", id))
        .json(&edit)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["alert"]["isActive"], false);
    assert_eq!(
        body["data"]["alert"]["message"],
        "Advisory extended through the weekend."
    );

    let body = fixture.get_json("/api/public/alerts").await;
    assert_eq!(body["data"]["alerts"], json!([]));
}

/// State over a memory store with a signed-in admin, for driving the router
/// directly.
async fn memory_state() -> (Arc<MemoryStore>, AppState, String) {
    let store = Arc::new(MemoryStore::new());
    let auth = Arc::new(MemoryAuth::with_admin(ADMIN_EMAIL, ADMIN_PASSWORD));
    let token = auth
        .sign_in(ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .unwrap()
        .token;

    let state = AppState {
        session: Arc::new(SyncSession::open(store.clone()).await.unwrap()),
        public: Arc::new(PublicFeed::open(store.as_ref()).await.unwrap()),
        auth,
    };
    (store, state, token)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let (_store, state, token) = memory_state().await;
    let app = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/alerts")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"title": "Main break", "isActive": "yes"}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["revisionId"].is_number());

    let request = Request::builder()
        .method("PUT")
        .uri("/api/admin/banner")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_public_feed_reports_stale() {
    let (store, state, _token) = memory_state().await;
    let app = create_router(state);

    store.fail_subscriptions(Collection::Alerts, "permission denied");

    let request = Request::builder()
        .uri("/api/public/alerts")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["stale"], true);

    let request = Request::builder()
        .uri("/api/public/banner")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(read_json(response).await["data"]["stale"], true);
}
