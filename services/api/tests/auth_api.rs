mod common;

use axum::http::{header, Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn register_issues_token_and_cookie() {
    let app = TestApp::new();
    let response = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ann", "email": "Ann@Example.com", "password": "secret123" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));

    assert_eq!(app.db.user_count(), 1);
    let sent = app.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ann@example.com");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();
    app.register("Ann", "ann@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Other Ann", "email": " ANN@example.com ", "password": "secret123" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "User already exists");
    assert_eq!(app.db.user_count(), 1);
}

#[tokio::test]
async fn registration_validates_input() {
    let app = TestApp::new();
    for payload in [
        json!({ "name": "Ann", "email": "not-an-email", "password": "secret123" }),
        json!({ "name": "Ann", "email": "ann@example.com", "password": "12345" }),
        json!({ "name": "  ", "email": "ann@example.com", "password": "secret123" }),
    ] {
        let (status, _) = app
            .call(Method::POST, "/api/auth/register", None, Some(payload))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    assert_eq!(app.db.user_count(), 0);
}

#[tokio::test]
async fn login_then_me() {
    let app = TestApp::new();
    let (id, _) = app.register("Ann", "ann@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user"].get("hashed_password").is_none());
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(app.db.user(id).last_login.is_some());

    let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ann@example.com");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::new();
    app.register("Ann", "ann@example.com").await;

    let (wrong_status, wrong_body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "nope-nope" })),
        )
        .await;
    let (unknown_status, unknown_body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "bob@example.com", "password": "secret123" })),
        )
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["error"], unknown_body["error"]);
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = TestApp::new();
    let (status, _) = app.call(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::GET, "/api/auth/me", Some("garbage.token.value"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_account_loses_access() {
    let app = TestApp::new();
    let (_, token) = app.register("Ann", "ann@example.com").await;

    let (status, _) = app.call(Method::DELETE, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::new();
    app.register("Ann", "ann@example.com").await;

    // Unknown addresses get the same answer.
    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({ "email": "ann@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let link = {
        let sent = app.mailer.sent.lock().unwrap();
        let mail = sent.last().unwrap();
        mail.text_body
            .split_whitespace()
            .find(|w| w.contains("/reset-password/"))
            .unwrap()
            .to_string()
    };
    let token = link.rsplit('/').next().unwrap().trim_end_matches('.').to_string();

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({ "token": token, "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Tokens are single use.
    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({ "token": token, "password": "another-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
