use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use referral_api::config::{AppConfig, StorageKind};
use referral_api::store::{MemoryStore, ReferralStore};
use referral_api::{build_router, AppState};

const PASSWORD: &str = "password123";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(AppConfig {
            storage: StorageKind::Memory,
            jwt_secret: "integration-secret".into(),
            ..AppConfig::default()
        })
    }

    fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(config, store.clone()));
        Self { router: build_router(state), store }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let request = match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .send(Method::POST, "/register", None, Some(json!({ "email": email, "password": PASSWORD })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(Method::POST, "/login", None, Some(json!({ "email": email, "password": PASSWORD })))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    async fn issue(&self, token: &str, code: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/referral-code",
            Some(token),
            Some(json!({ "code": code, "expiry": "2099-12-31" })),
        )
        .await
    }
}

#[tokio::test]
async fn health_reports_store() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"][0]["name"], "store");
}

#[tokio::test]
async fn metrics_route_absent_without_recorder() {
    let app = TestApp::new();
    let (status, _) = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_twice_is_rejected() {
    let app = TestApp::new();
    app.register("ann@example.com").await;

    let (status, body) = app
        .send(Method::POST, "/register", None, Some(json!({ "email": "ann@example.com", "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "E1002");
}

#[tokio::test]
async fn register_response_never_contains_password() {
    let app = TestApp::new();
    let (_, body) = app
        .send(Method::POST, "/register", None, Some(json!({ "email": "ann@example.com", "password": PASSWORD })))
        .await;
    let text = body.to_string();
    assert!(!text.contains(PASSWORD));
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::POST, "/register", None, Some(json!({ "email": "ann@example.com" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E0002");

    let (status, body) = app
        .send(Method::POST, "/register", None, Some(json!({ "email": "not-an-email", "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E0002");

    let (status, body) = app
        .send(Method::POST, "/register", None, Some(json!({ "email": "ann@example.com", "password": "short" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E1008");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.register("ann@example.com").await;

    let (status, body) = app
        .send(Method::POST, "/login", None, Some(json!({ "email": "ann@example.com", "password": "password999" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "E1001");
}

#[tokio::test]
async fn login_returns_bearer_token() {
    let app = TestApp::new();
    app.register("ann@example.com").await;

    let (status, body) = app
        .send(Method::POST, "/login", None, Some(json!({ "email": "ann@example.com", "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["expires_in"], 3600);
}

#[tokio::test]
async fn code_endpoints_require_bearer_token() {
    let app = TestApp::new();

    let (status, _) = app
        .send(Method::POST, "/referral-code", None, Some(json!({ "code": "ABC123" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::DELETE, "/referral-code", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_from_other_secret_is_rejected() {
    let issuer = TestApp::with_config(AppConfig {
        jwt_secret: "issuer-secret".into(),
        ..AppConfig::default()
    });
    issuer.register("ann@example.com").await;
    let foreign = issuer.login("ann@example.com").await;

    let app = TestApp::new();
    let (status, body) = app.issue(&foreign, "ABC123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "E1005");
}

#[tokio::test]
async fn issue_lookup_and_delete_code() {
    let app = TestApp::new();
    app.register("ann@example.com").await;
    let token = app.login("ann@example.com").await;

    let (status, body) = app.issue(&token, "ABC123").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["code"], "ABC123");
    assert_eq!(body["data"]["expires_at"], "2099-12-31T00:00:00Z");

    let (status, body) = app
        .send(Method::GET, "/referral-code?email=ann@example.com", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], "ABC123");

    let (status, _) = app.send(Method::DELETE, "/referral-code", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::DELETE, "/referral-code", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "E2001");

    let (status, _) = app
        .send(Method::GET, "/referral-code?email=ann@example.com", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lookup_for_unknown_email_is_not_found() {
    let app = TestApp::new();
    let (status, _) = app
        .send(Method::GET, "/referral-code?email=ghost@example.com", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn new_code_replaces_old_one() {
    let app = TestApp::new();
    app.register("ann@example.com").await;
    let token = app.login("ann@example.com").await;

    app.issue(&token, "FIRST1").await;
    let (status, _) = app.issue(&token, "SECOND").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .send(Method::POST, "/register-by-code/FIRST1", None, Some(json!({ "email": "x@example.com", "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::POST, "/register-by-code/SECOND", None, Some(json!({ "email": "x@example.com", "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn code_held_by_another_account_conflicts() {
    let app = TestApp::new();
    app.register("ann@example.com").await;
    app.register("bob@example.com").await;
    let ann = app.login("ann@example.com").await;
    let bob = app.login("bob@example.com").await;

    app.issue(&ann, "SHARED").await;
    let (status, body) = app.issue(&bob, "SHARED").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "E2003");
}

#[tokio::test]
async fn invalid_code_creates_no_account() {
    let app = TestApp::new();
    app.register("ann@example.com").await;
    let before = app.store.account_count().unwrap();

    let (status, body) = app
        .send(Method::POST, "/register-by-code/NOPE99", None, Some(json!({ "email": "new@example.com", "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E2002");
    assert_eq!(app.store.account_count().unwrap(), before);
}

#[tokio::test]
async fn referral_flow_end_to_end() {
    let app = TestApp::new();

    let one_id = app.register("one@example.com").await;
    let one = app.login("one@example.com").await;
    let (status, _) = app.issue(&one, "ABC123").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(Method::POST, "/register-by-code/ABC123", None, Some(json!({ "email": "two@example.com", "password": PASSWORD })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["referrer_id"], one_id.as_str());
    let two_id = body["data"]["account"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Method::GET, &format!("/referrals/{one_id}"), Some(&one), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], two_id.as_str());
    assert_eq!(body["data"]["items"][0]["email"], "two@example.com");

    app.register("three@example.com").await;
    let three = app.login("three@example.com").await;
    let (status, body) = app
        .send(Method::GET, &format!("/referrals/{one_id}"), Some(&three), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "E0005");

    let (status, _) = app.send(Method::GET, &format!("/referrals/{one_id}"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn referred_account_can_log_in() {
    let app = TestApp::new();
    app.register("one@example.com").await;
    let one = app.login("one@example.com").await;
    app.issue(&one, "ABC123").await;

    app.send(Method::POST, "/register-by-code/ABC123", None, Some(json!({ "email": "two@example.com", "password": PASSWORD })))
        .await;
    app.login("two@example.com").await;
}

#[tokio::test]
async fn single_use_codes_work_once() {
    let app = TestApp::with_config(AppConfig {
        single_use_codes: true,
        ..AppConfig::default()
    });
    app.register("one@example.com").await;
    let one = app.login("one@example.com").await;
    app.issue(&one, "ONCE01").await;

    let (first, _) = app
        .send(Method::POST, "/register-by-code/ONCE01", None, Some(json!({ "email": "a@example.com", "password": PASSWORD })))
        .await;
    let (second, body) = app
        .send(Method::POST, "/register-by-code/ONCE01", None, Some(json!({ "email": "b@example.com", "password": PASSWORD })))
        .await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E2002");
}

#[tokio::test]
async fn past_expiry_is_rejected() {
    let app = TestApp::new();
    app.register("ann@example.com").await;
    let token = app.login("ann@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/referral-code",
            Some(&token),
            Some(json!({ "code": "OLD123", "expiry": "2001-01-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E0002");
}

#[tokio::test]
async fn generated_code_when_omitted() {
    let app = TestApp::new();
    app.register("ann@example.com").await;
    let token = app.login("ann@example.com").await;

    let (status, body) = app
        .send(Method::POST, "/referral-code", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["code"].as_str().unwrap().len(), 8);
}
