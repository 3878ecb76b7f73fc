//! HTTP tests for registration, login and the user resource.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp, ADDRESS, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn register_returns_user_and_tokens() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/v1/auth/register",
            Some(json!({
                "name": "newbie",
                "email": "Newbie@Gmail.com",
                "password": "qkartpass9"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert_eq!(body["user"]["email"], "newbie@gmail.com");
    assert_eq!(body["user"]["walletMoney"], "500");
    assert_eq!(body["user"]["address"], "ADDRESS_NOT_SET");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["tokens"]["access"]["token"].as_str().is_some());
    assert!(body["tokens"]["refresh"]["token"].as_str().is_some());
}

#[tokio::test]
async fn register_with_taken_email_is_409() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/v1/auth/register",
            Some(json!({
                "name": "dup",
                "email": "CRIO-USER@gmail.com",
                "password": "qkartpass9"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response_json(response).await["message"], "Email already taken");
}

#[tokio::test]
async fn register_with_weak_password_is_400() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/v1/auth/register",
            Some(json!({ "name": "weak", "email": "weak@gmail.com", "password": "12345678" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_accepts_correct_password_only() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/v1/auth/login",
            Some(json!({ "email": "crio-user@gmail.com", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["user"]["_id"], app.user.id.to_string());

    let token = body["tokens"]["access"]["token"].as_str().unwrap().to_string();
    let response = app.request(Method::GET, "/v1/products", None, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/v1/auth/login",
            Some(json!({ "email": "crio-user@gmail.com", "password": "wrongpass1" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response_json(response).await["message"],
        "Incorrect email or password"
    );
}

#[tokio::test]
async fn user_can_read_own_record_and_address() {
    let app = TestApp::new().await;
    let uri = format!("/v1/users/{}", app.user.id);

    let response = app.request_authenticated(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["name"], "crio-user");

    let response = app
        .request_authenticated(Method::GET, &format!("{}?q=address", uri), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await,
        json!({ "address": "ADDRESS_NOT_SET" })
    );
}

#[tokio::test]
async fn set_address_validates_length_and_persists() {
    let app = TestApp::new().await;
    let uri = format!("/v1/users/{}", app.user.id);

    let response = app
        .request_authenticated(Method::PUT, &uri, Some(json!({ "address": "too short" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(Method::PUT, &uri, Some(json!({ "address": ADDRESS })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["address"], ADDRESS);
    assert_eq!(app.current_user().await.address, ADDRESS);
}

#[tokio::test]
async fn other_users_record_is_forbidden() {
    let app = TestApp::new().await;
    let other = app
        .state
        .services
        .users
        .create_user(qkart_api::services::users::RegisterInput {
            name: "other".into(),
            email: "other@gmail.com".into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap();
    let uri = format!("/v1/users/{}", other.id);

    let response = app.request_authenticated(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request_authenticated(Method::PUT, &uri, Some(json!({ "address": ADDRESS })))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn health_is_up() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "up");
}
