pub mod auth;
pub mod commerce;
pub mod common;
pub mod health;
pub mod users;

use std::sync::Arc;

use crate::config::CommerceConfig;
use crate::repositories::Stores;
use crate::services::{
    commerce::{CartService, CheckoutService, ProductCatalogService},
    users::UserService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub products: Arc<ProductCatalogService>,
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    /// Wire every service onto the same set of stores.
    pub fn new(stores: &Stores, commerce: Arc<CommerceConfig>) -> Self {
        let users = Arc::new(UserService::new(stores.users.clone(), commerce.clone()));
        let products = Arc::new(ProductCatalogService::new(stores.products.clone()));
        let carts = Arc::new(CartService::new(
            stores.carts.clone(),
            stores.products.clone(),
            commerce.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            stores.carts.clone(),
            stores.users.clone(),
            stores.settlements.clone(),
            commerce,
        ));

        Self {
            users,
            products,
            carts,
            checkout,
        }
    }
}
