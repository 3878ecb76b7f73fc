//! QKart API Library
//!
//! Accounts, shopping carts and wallet checkout for the QKart storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::auth::{AuthConfig, AuthService};
use crate::config::{AppConfig, StoreBackend};
use crate::errors::ServiceError;
use crate::repositories::{InMemoryStore, SeaOrmStore, Stores};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(config: AppConfig, stores: &Stores) -> Self {
        let commerce = Arc::new(config.commerce.clone());
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        Self {
            services: handlers::AppServices::new(stores, commerce),
            auth,
            config: Arc::new(config),
        }
    }
}

/// Opens the configured store backend, running migrations when asked to.
pub async fn build_stores(config: &AppConfig) -> Result<Stores, ServiceError> {
    match config.store_backend {
        StoreBackend::InMemory => {
            ::tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Stores::from_backend(Arc::new(InMemoryStore::new())))
        }
        StoreBackend::Database => {
            let pool = db::establish_connection_from_app_config(config).await?;
            if config.auto_migrate {
                db::run_migrations(&pool).await?;
            }
            Ok(Stores::from_backend(Arc::new(SeaOrmStore::new(Arc::new(
                pool,
            )))))
        }
    }
}

/// Versioned API routes, mounted under `/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/users", handlers::users::user_routes())
        .nest("/cart", handlers::commerce::carts_routes())
        .nest("/products", handlers::commerce::products_routes())
}

/// Full application router with the HTTP middleware stack applied.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/v1", api_v1_routes())
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(crate::tracing::configure_http_tracing())
        .layer(middleware::from_fn(crate::tracing::request_id_middleware))
        .with_state(state)
}
