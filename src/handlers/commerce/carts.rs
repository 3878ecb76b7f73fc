use axum::{
    extract::{Json, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, no_content_response, success_response,
        validate_input,
    },
    services::commerce::CartView,
    AppState,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(add_to_cart).put(update_cart_item))
        .route("/checkout", put(checkout))
}

// Request DTOs

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 4294967295))]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    pub product_id: Uuid,
    #[validate(range(min = 0, max = 4294967295))]
    pub quantity: i64,
}

fn quantity(value: i64) -> Result<u32, ApiError> {
    u32::try_from(value).map_err(|_| ApiError::BadRequest("Invalid quantity".to_string()))
}

/// Get the caller's cart
async fn get_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .get_cart(&user)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

/// Add a product to the caller's cart, creating the cart if needed
async fn add_to_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .carts
        .add_item(&user, payload.product_id, quantity(payload.quantity)?)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(CartView::from(cart)))
}

/// Update a line item quantity; zero removes the item
async fn update_cart_item(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    if payload.quantity == 0 {
        state
            .services
            .carts
            .remove_item(&user, payload.product_id)
            .await
            .map_err(map_service_error)?;
        return Ok(no_content_response());
    }

    let cart = state
        .services
        .carts
        .update_item(&user, payload.product_id, quantity(payload.quantity)?)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(CartView::from(cart)))
}

/// Check out the caller's cart against their wallet
async fn checkout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let idempotency_key = match headers.get(IDEMPOTENCY_KEY_HEADER) {
        None => None,
        Some(value) => Some(
            value
                .to_str()
                .ok()
                .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
                .ok_or_else(|| {
                    ApiError::BadRequest("Idempotency-Key must be a UUID".to_string())
                })?,
        ),
    };

    state
        .services
        .checkout
        .checkout(&user, idempotency_key)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
