//! Gate middleware mounted on a plain router, driven with `oneshot`

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use twofa_core::{Account, EnforcementConfig, ExemptSet, MemoryAccountStore, TwoFactorMethod};
use twofa_web::identity::{Claims, IdentityResolver, TokenVerifier};
use twofa_web::middleware::two_factor_gate;
use twofa_web::TwoFactorGate;

const SECRET: &[u8] = b"middleware-secret";

struct TestApp {
    router: Router,
    verifier: Arc<TokenVerifier>,
}

impl TestApp {
    async fn new(require_2fa: bool, exempt: &str, accounts: Vec<Account>) -> Self {
        let store = MemoryAccountStore::with_accounts(accounts).await;
        let verifier = Arc::new(TokenVerifier::new(SECRET));
        let identity = IdentityResolver::from_store(verifier.clone(), Arc::new(store));
        let config = EnforcementConfig::new(require_2fa, ExemptSet::parse(exempt));
        let gate = Arc::new(TwoFactorGate::new(Arc::new(config), identity));

        let router = Router::new()
            .route("/api/data/tasks", get(|| async { "tasks" }).post(|| async { "created" }))
            .route("/api/actions/tasks/assign", post(|| async { "assigned" }))
            .route("/api/auth/login", post(|| async { "logged in" }))
            .route("/auth/totp", post(|| async { "totp" }))
            .route("/productions/new", post(|| async { "production" }))
            .layer(from_fn_with_state(gate, two_factor_gate));

        Self { router, verifier }
    }

    fn token_for(&self, account: &Account) -> String {
        self.verifier
            .sign(&Claims::access(account.id, Duration::minutes(15)))
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, String, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

#[tokio::test]
async fn test_post_without_2fa_is_blocked_with_json() {
    let caller = Account::new("a@x.com");
    let app = TestApp::new(true, "", vec![caller.clone()]).await;

    let (status, content_type, body) = app
        .send(
            request(Method::POST, "/api/actions/tasks/assign")
                .header(header::AUTHORIZATION, format!("Bearer {}", app.token_for(&caller)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(content_type, "application/json");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["2fa_required"], true);
    assert_eq!(json["error"], true);
    assert_eq!(json["redirect_to"], "/profile");
    assert_eq!(json["user_email"], "a@x.com");
}

#[tokio::test]
async fn test_browser_post_gets_html_page() {
    let caller = Account::new("a@x.com");
    let app = TestApp::new(true, "", vec![caller.clone()]).await;

    let (status, content_type, body) = app
        .send(
            request(Method::POST, "/productions/new")
                .header(header::COOKIE, format!("access_token_cookie={}", app.token_for(&caller)))
                .header(header::ACCEPT, "text/html")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(content_type, "text/html; charset=utf-8");
    assert!(body.contains("Two-Factor Authentication is required"));
    assert!(body.contains("/profile"));
}

#[tokio::test]
async fn test_reads_pass_for_non_compliant_caller() {
    let caller = Account::new("a@x.com");
    let app = TestApp::new(true, "", vec![caller.clone()]).await;

    let (status, _, body) = app
        .send(
            request(Method::GET, "/api/data/tasks")
                .header(header::AUTHORIZATION, format!("Bearer {}", app.token_for(&caller)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "tasks");
}

#[tokio::test]
async fn test_auth_endpoints_pass_for_anyone() {
    let caller = Account::new("a@x.com");
    let app = TestApp::new(true, "", vec![caller.clone()]).await;

    for uri in ["/api/auth/login", "/auth/totp"] {
        let (status, _, _) = app
            .send(request(Method::POST, uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK, "{uri}");

        let (status, _, _) = app
            .send(
                request(Method::POST, uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", app.token_for(&caller)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn test_compliant_exempt_and_anonymous_writes_pass() {
    let secured = Account::new("s@x.com").with_method(TwoFactorMethod::Totp);
    let exempt = Account::new("ci@x.com");
    let app = TestApp::new(true, "CI@x.com", vec![secured.clone(), exempt.clone()]).await;

    for caller in [&secured, &exempt] {
        let (status, _, body) = app
            .send(
                request(Method::POST, "/api/data/tasks")
                    .header(header::AUTHORIZATION, format!("Bearer {}", app.token_for(caller)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "created");
    }

    let (status, _, _) = app
        .send(request(Method::POST, "/api/data/tasks").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_token_passes_through() {
    let app = TestApp::new(true, "", vec![Account::new("a@x.com")]).await;

    let (status, _, _) = app
        .send(
            request(Method::POST, "/api/actions/tasks/assign")
                .header(header::AUTHORIZATION, "Bearer forged.token.value")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_junk_bearer_does_not_hide_session_cookie() {
    let caller = Account::new("a@x.com");
    let app = TestApp::new(true, "", vec![caller.clone()]).await;
    let cookie = format!("access_token_cookie={}", app.token_for(&caller));

    let (status, _, _) = app
        .send(
            request(Method::POST, "/api/actions/tasks/assign")
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .send(
            request(Method::POST, "/api/actions/tasks/assign")
                .header(header::AUTHORIZATION, "Bearer x")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("2fa_required"));
}

#[tokio::test]
async fn test_enforcement_off_passes_everything() {
    let caller = Account::new("a@x.com");
    let app = TestApp::new(false, "", vec![caller.clone()]).await;

    let (status, _, body) = app
        .send(
            request(Method::POST, "/api/actions/tasks/assign")
                .header(header::AUTHORIZATION, format!("Bearer {}", app.token_for(&caller)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "assigned");
}
