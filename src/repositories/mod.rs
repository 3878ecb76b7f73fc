//! Persistence seam for the cart/checkout core.
//!
//! Services only talk to the traits in this module. Two backends implement
//! all of them: [`memory::InMemoryStore`] and [`sea_orm_store::SeaOrmStore`].

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Cart, Email, NewUser, PaymentOption, Product, Settlement, SettlementReceipt, User};

pub mod memory;
pub mod sea_orm_store;

pub use memory::{FailPoint, InMemoryStore};
pub use sea_orm_store::SeaOrmStore;

/// Raw storage failures. Services classify these before surfacing them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// The record changed since it was read (optimistic version mismatch).
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The conditional wallet debit found less money than the settlement total.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Timeout or lost connection; the caller may retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}

/// Read-only product lookup.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_by_id(&self, product_id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn list(&self) -> Result<Vec<Product>, StoreError>;
}

/// One cart per owner email.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_by_owner(&self, email: &Email) -> Result<Option<Cart>, StoreError>;

    /// Creates an empty cart. Fails with [`StoreError::AlreadyExists`] if the
    /// owner already has one.
    async fn create(&self, email: &Email, payment_option: PaymentOption)
        -> Result<Cart, StoreError>;

    /// Returns the owner's cart, creating it atomically if absent. Concurrent
    /// callers all observe the same cart.
    async fn find_or_create(
        &self,
        email: &Email,
        payment_option: PaymentOption,
    ) -> Result<Cart, StoreError>;

    /// Writes the cart if the stored version still equals `cart.version` and
    /// returns it with the bumped version. A stale version fails with
    /// [`StoreError::Conflict`] and writes nothing.
    async fn save(&self, cart: &Cart) -> Result<Cart, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the email is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn update_address(&self, user_id: Uuid, address: &str) -> Result<User, StoreError>;
}

/// Atomic checkout commit spanning the user, cart and settlement records.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Debits the wallet, clears the cart and records the receipt as one unit.
    ///
    /// Fails without side effects when the settlement id was already used
    /// (`AlreadyExists`), the cart moved past `cart_version` (`Conflict`), or
    /// the wallet holds less than the total at commit time
    /// (`InsufficientFunds`).
    async fn settle(&self, settlement: &Settlement) -> Result<SettlementReceipt, StoreError>;

    async fn find_settlement(&self, id: Uuid) -> Result<Option<SettlementReceipt>, StoreError>;
}

/// The store handles handed to service constructors.
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn ProductCatalog>,
    pub carts: Arc<dyn CartStore>,
    pub users: Arc<dyn UserStore>,
    pub settlements: Arc<dyn SettlementStore>,
}

impl Stores {
    /// Uses one backend for every store.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ProductCatalog + CartStore + UserStore + SettlementStore + 'static,
    {
        Self {
            products: backend.clone(),
            carts: backend.clone(),
            users: backend.clone(),
            settlements: backend,
        }
    }
}
