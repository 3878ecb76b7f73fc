use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    errors::{ApiError, ServiceError},
    handlers::common::{map_service_error, success_response, validate_input},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetAddressRequest {
    #[validate(length(min = 20, message = "Address must be at least 20 characters"))]
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub address: String,
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/:user_id", get(get_user).put(set_address))
}

fn ensure_self(user: &AuthenticatedUser, user_id: Uuid) -> Result<(), ServiceError> {
    if user.0.id != user_id {
        return Err(ServiceError::Forbidden(
            "User not authorized to access this resource".to_string(),
        ));
    }
    Ok(())
}

/// Get the caller's user record, or only the address with `?q=address`
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(&user, user_id)?;

    if query.q.as_deref() == Some("address") {
        let address = state
            .services
            .users
            .get_user_address_by_id(user_id)
            .await
            .map_err(map_service_error)?;
        return Ok(success_response(AddressResponse {
            address: address.address,
        }));
    }

    let found = state
        .services
        .users
        .get_user_by_id(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(found))
}

/// Replace the caller's shipping address
pub async fn set_address(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SetAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(&user, user_id)?;
    validate_input(&payload)?;

    let address = state
        .services
        .users
        .set_address(user_id, &payload.address)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(AddressResponse { address }))
}
