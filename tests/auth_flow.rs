//! End-to-end tests for the authentication HTTP surface
//!
//! Each test builds the full router over a fresh store and drives it
//! in-process with `tower::ServiceExt::oneshot`.

use axum::{
    body::{to_bytes, Body},
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use keygate::{
    api::build_router,
    auth::{models::User, AuthService, JwtHandler, MemoryUserStore, PasswordHasher, UserStore},
    middleware::{RateLimitConfig, RateLimitLayer},
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tempfile::NamedTempFile;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-test-secret-at-least-32-bytes";
const ORIGIN: &str = "http://localhost:3000";

fn memory_app() -> Router {
    let service = AuthService::new(
        Arc::new(MemoryUserStore::new()),
        PasswordHasher::new(4),
        Arc::new(JwtHandler::new(SECRET)),
    );
    build_router(service, ORIGIN, None).unwrap()
}

fn sqlite_app(path: &str, timeout: std::time::Duration) -> Router {
    let store = UserStore::new(path, timeout).unwrap();
    let service = AuthService::new(
        Arc::new(store),
        PasswordHasher::new(4),
        Arc::new(JwtHandler::new(SECRET)),
    );
    build_router(service, ORIGIN, None).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_auth(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn register(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        post_json(
            "/api/auth/register",
            json!({ "email": email, "password": password }),
        ),
    )
    .await
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        post_json(
            "/api/auth/login",
            json!({ "email": email, "password": password }),
        ),
    )
    .await
}

fn tamper(token: &str) -> String {
    let sig_start = token.rfind('.').unwrap() + 1;
    let replacement = if token[sig_start..].starts_with('A') { "B" } else { "A" };
    let mut tampered = token.to_string();
    tampered.replace_range(sig_start..sig_start + 1, replacement);
    tampered
}

#[tokio::test]
async fn test_end_to_end_flow() {
    let app = memory_app();

    let (status, body) = register(&app, "a@b.com", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["message"].is_string());
    assert_eq!(body["user"]["email"], "a@b.com");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("password_hash").is_none());
    assert!(body.get("token").is_none());

    let (status, body) = login(&app, "a@b.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    let (status, body) = login(&app, "a@b.com", "wrong-password").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid password");

    let (status, body) = send(
        &app,
        get_with_auth("/api/auth/me", Some(&format!("Bearer {token}"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@b.com");
    assert!(body["user"]["sub"].as_str().is_some_and(|s| !s.is_empty()));
    assert_eq!(
        body["user"]["exp"].as_i64().unwrap() - body["user"]["iat"].as_i64().unwrap(),
        3600
    );

    let (status, body) = send(&app, get_with_auth("/api/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, body) = send(
        &app,
        get_with_auth("/api/auth/me", Some(&format!("Bearer {}", tamper(&token)))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_protected_route_uses_the_same_gate() {
    let app = memory_app();
    register(&app, "a@b.com", "secret1").await;
    let (_, body) = login(&app, "a@b.com", "secret1").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        get_with_auth("/api/protected", Some(&format!("Bearer {token}"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Secure access for a@b.com");

    let (status, _) = send(&app, get_with_auth("/api/protected", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        get_with_auth("/api/protected", Some(&format!("Token {token}"))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        get_with_auth("/api/protected", Some("Bearer not.a.token")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bearer_scheme_any_case() {
    let app = memory_app();
    register(&app, "a@b.com", "secret1").await;
    let (_, body) = login(&app, "a@b.com", "secret1").await;
    let token = body["token"].as_str().unwrap().to_string();

    for scheme in ["bearer", "BEARER"] {
        let (status, body) = send(
            &app,
            get_with_auth("/api/auth/me", Some(&format!("{scheme} {token}"))),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "scheme {scheme}");
        assert_eq!(body["user"]["email"], "a@b.com");
    }
}

#[tokio::test]
async fn test_expired_token_is_forbidden() {
    let app = memory_app();
    let jwt = JwtHandler::new(SECRET);
    let user = User {
        id: Uuid::new_v4(),
        email: "a@b.com".to_string(),
        password_hash: String::new(),
        created_at: Utc::now().to_rfc3339(),
    };
    let expired = jwt
        .generate_token_at(&user, Utc::now() - Duration::hours(1) - Duration::minutes(1))
        .unwrap();

    let (status, _) = send(
        &app,
        get_with_auth("/api/auth/me", Some(&format!("Bearer {expired}"))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_from_other_secret_is_forbidden() {
    let app = memory_app();
    let foreign = JwtHandler::new("some-other-deployment-secret-32-bytes!");
    let user = User {
        id: Uuid::new_v4(),
        email: "a@b.com".to_string(),
        password_hash: String::new(),
        created_at: Utc::now().to_rfc3339(),
    };
    let token = foreign.generate_token(&user).unwrap();

    let (status, _) = send(
        &app,
        get_with_auth("/api/auth/me", Some(&format!("Bearer {token}"))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let app = memory_app();

    let (status, _) = register(&app, "a@b.com", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "a@b.com", "secret2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
async fn test_validation_errors_are_field_level() {
    let app = memory_app();

    let (status, body) = register(&app, "a@b.com", "12345").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["password"].is_array());
    assert!(body["errors"].get("email").is_none());

    let (status, body) = register(&app, "not-an-email", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["email"].is_array());

    let (status, body) = send(&app, post_json("/api/auth/login", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["email"], json!(["Required"]));
    assert_eq!(body["errors"]["password"], json!(["Required"]));
}

#[tokio::test]
async fn test_unknown_user_login() {
    let app = memory_app();

    let (status, body) = login(&app, "ghost@b.com", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = memory_app();

    let request = Request::post("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_health_and_security_headers() {
    let app = memory_app();

    let response = app
        .clone()
        .oneshot(get_with_auth("/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::X_CONTENT_TYPE_OPTIONS],
        "nosniff"
    );
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn test_sqlite_backed_flow() {
    let temp_file = NamedTempFile::new().unwrap();
    let app = sqlite_app(
        temp_file.path().to_str().unwrap(),
        std::time::Duration::from_secs(5),
    );

    let (status, _) = register(&app, "a@b.com", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = register(&app, "a@b.com", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = login(&app, "a@b.com", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_locked_database_is_internal_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_str().unwrap();
    let app = sqlite_app(path, std::time::Duration::from_millis(150));

    let holder = Connection::open(path).unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let (status, body) = register(&app, "a@b.com", "secret1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal server error" }));

    holder.execute_batch("COMMIT").unwrap();
    let (status, _) = register(&app, "a@b.com", "secret1").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_rate_limited_response_keeps_cors_and_security_headers() {
    let service = AuthService::new(
        Arc::new(MemoryUserStore::new()),
        PasswordHasher::new(4),
        Arc::new(JwtHandler::new(SECRET)),
    );
    let limiter = RateLimitLayer::new(RateLimitConfig {
        max_requests: 2,
        window: std::time::Duration::from_secs(60),
    });
    let app = build_router(service, ORIGIN, Some(limiter))
        .unwrap()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    let health = || {
        Request::get("/health")
            .header(header::ORIGIN, ORIGIN)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(health()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(health()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let headers = response.headers();
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}
