use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::{
    auth::AuthTokens,
    errors::{ApiError, ServiceError},
    handlers::common::{created_response, map_service_error, success_response, validate_input},
    models::User,
    services::users::RegisterInput,
    AppState,
};

/// Login request payload
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body returned by register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: AuthTokens,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Register handler
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = state
        .services
        .users
        .create_user(payload)
        .await
        .map_err(map_service_error)?;
    let tokens = state
        .auth
        .generate_tokens(&user)
        .map_err(ServiceError::from)?;

    info!(user_id = %user.id, "Registered new user");
    Ok(created_response(AuthResponse { user, tokens }))
}

/// Login handler
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let user = state
        .services
        .users
        .login(&payload.email, &payload.password)
        .await
        .map_err(map_service_error)?;
    let tokens = state
        .auth
        .generate_tokens(&user)
        .map_err(ServiceError::from)?;

    Ok(success_response(AuthResponse { user, tokens }))
}
