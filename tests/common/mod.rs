#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

use qkart_api::{
    build_router,
    config::{AppConfig, StoreBackend, DEV_DEFAULT_JWT_SECRET},
    models::{Product, User},
    repositories::{InMemoryStore, Stores, UserStore},
    services::users::RegisterInput,
    AppState,
};

pub const ADDRESS: &str = "221B Baker Street, London NW1 6XE";
pub const PASSWORD: &str = "learnqkart1";

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        DEV_DEFAULT_JWT_SECRET.to_string(),
        3600,
        86_400,
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.store_backend = StoreBackend::InMemory;
    cfg
}

/// Application harness backed by the in-memory store.
///
/// Seeds two products and one registered user whose access token is used by
/// the `*_authenticated` helpers.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: InMemoryStore,
    pub user: User,
    pub pen: Product,
    pub book: Product,
    token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = InMemoryStore::new();
        let pen = Product::new("Pen", "Stationery", dec!(30));
        let book = Product::new("Book", "Books", dec!(5));
        store.insert_product(pen.clone()).await;
        store.insert_product(book.clone()).await;

        let stores = Stores::from_backend(Arc::new(store.clone()));
        let state = AppState::new(test_config(), &stores);
        let router = build_router(state.clone());

        let user = state
            .services
            .users
            .create_user(RegisterInput {
                name: "crio-user".into(),
                email: "crio-user@gmail.com".into(),
                password: PASSWORD.into(),
            })
            .await
            .expect("register test user");
        let token = state
            .auth
            .generate_tokens(&user)
            .expect("issue tokens")
            .access
            .token;

        Self {
            router,
            state,
            store,
            user,
            pen,
            book,
            token,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Overwrite the test user's wallet and address directly in the store.
    pub async fn set_profile(&self, wallet: Decimal, address: &str) {
        let mut user = self.current_user().await;
        user.wallet_money = wallet;
        user.address = address.to_string();
        self.store.put_user(user).await;
    }

    /// Fresh read of the test user from the store.
    pub async fn current_user(&self) -> User {
        UserStore::find_by_id(&self.store, self.user.id)
            .await
            .expect("store read")
            .expect("test user exists")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
