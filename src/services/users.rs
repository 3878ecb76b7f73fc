use crate::{
    auth::password::{hash_password, validate_password_strength, verify_password},
    config::CommerceConfig,
    errors::ServiceError,
    models::{Email, NewUser, User, UserAddress},
    repositories::{StoreError, UserStore},
};
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Input for creating a new user account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
}

/// Service for user accounts: registration, credentials and address.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    commerce: Arc<CommerceConfig>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, commerce: Arc<CommerceConfig>) -> Self {
        Self { users, commerce }
    }

    /// Registers a user with the configured starting wallet and address.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: RegisterInput) -> Result<User, ServiceError> {
        input.validate()?;
        let email = parse_email(&input.email)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::AlreadyExists("Email already taken".to_string()));
        }

        let new_user = NewUser {
            name: input.name,
            email,
            password_hash: hash_password(&input.password)?,
            wallet_money: self.commerce.default_wallet_money,
            address: self.commerce.default_address.clone(),
        };

        // A concurrent registration can still win the unique index.
        let user = self.users.create(new_user).await.map_err(|e| match e {
            StoreError::AlreadyExists(_) => {
                ServiceError::AlreadyExists("Email already taken".to_string())
            }
            other => other.into(),
        })?;

        counter!("qkart_users.registered", 1);
        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Gets a user by ID
    #[instrument(skip(self))]
    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Gets a user by email. An unknown address is reported as unauthorized
    /// so callers cannot probe which emails are registered.
    #[instrument(skip(self))]
    pub async fn get_user_by_email(&self, email: &str) -> Result<User, ServiceError> {
        let email = Email::parse(email)
            .map_err(|_| ServiceError::Unauthorized("User is unauthorized".to_string()))?;
        self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("User is unauthorized".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn get_user_address_by_id(&self, user_id: Uuid) -> Result<UserAddress, ServiceError> {
        Ok(self.get_user_by_id(user_id).await?.address_view())
    }

    /// Replaces the user's shipping address and returns the new value.
    #[instrument(skip(self, address))]
    pub async fn set_address(&self, user_id: Uuid, address: &str) -> Result<String, ServiceError> {
        let user = self.users.update_address(user_id, address).await.map_err(|e| match e {
            StoreError::NotFound(_) => ServiceError::NotFound("User not found".to_string()),
            other => other.into(),
        })?;
        info!("Updated user address");
        Ok(user.address)
    }

    /// Checks credentials. Unknown email and wrong password are indistinguishable.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Incorrect email or password".to_string());

        let user = match self.get_user_by_email(email).await {
            Ok(user) => user,
            Err(ServiceError::Unauthorized(_)) => return Err(invalid()),
            Err(other) => return Err(other),
        };

        verify_password(password, &user.password_hash).map_err(|_| {
            counter!("qkart_users.login_failed", 1);
            invalid()
        })?;

        Ok(user)
    }
}

fn parse_email(raw: &str) -> Result<Email, ServiceError> {
    Email::parse(raw).map_err(|e| ServiceError::InvalidRequest(format!("Invalid email: {}", e)))
}
