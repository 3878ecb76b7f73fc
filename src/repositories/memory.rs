//! In-process backend.
//!
//! All records live behind one `RwLock`, so every trait call is a single
//! critical section. `settle` stages its changes on copies and swaps them in
//! only after every step succeeded, which makes it all-or-nothing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{CartStore, ProductCatalog, SettlementStore, StoreError, UserStore};
use crate::models::{
    Cart, Email, NewUser, PaymentOption, Product, Settlement, SettlementReceipt, User,
};

/// Points where a test can force the next operation to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CartCreate,
    CartSave,
    /// Inside `settle`, after the wallet debit was staged and before the cart
    /// is cleared.
    SettleAfterDebit,
    /// Every call reports the storage as unavailable.
    Unavailable,
}

impl FailPoint {
    const COUNT: usize = 4;

    fn slot(self) -> usize {
        match self {
            Self::CartCreate => 0,
            Self::CartSave => 1,
            Self::SettleAfterDebit => 2,
            Self::Unavailable => 3,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    armed: [AtomicBool; FailPoint::COUNT],
}

impl Faults {
    fn arm(&self, point: FailPoint) {
        self.armed[point.slot()].store(true, Ordering::SeqCst);
    }

    /// One-shot: disarms the point when it fires.
    fn trip(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.armed[point.slot()].swap(false, Ordering::SeqCst) {
            debug!(?point, "injected storage failure");
            return Err(match point {
                FailPoint::Unavailable => {
                    StoreError::Unavailable("injected timeout".to_string())
                }
                _ => StoreError::Backend(format!("injected failure at {:?}", point)),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    carts: HashMap<Email, Cart>,
    settlements: HashMap<Uuid, SettlementReceipt>,
}

impl MemoryState {
    fn user_by_email(&self, email: &Email) -> Option<&User> {
        self.users.values().find(|user| &user.email == email)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure for the next operation passing `point`.
    pub fn fail_next(&self, point: FailPoint) {
        self.faults.arm(point);
    }

    pub async fn insert_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product);
    }

    /// Inserts or replaces a user record as-is.
    pub async fn put_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        self.faults.trip(FailPoint::Unavailable)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn find_by_id(&self, product_id: Uuid) -> Result<Option<Product>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        self.check_available()?;
        let mut products: Vec<Product> =
            self.state.read().await.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn find_by_owner(&self, email: &Email) -> Result<Option<Cart>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.carts.get(email).cloned())
    }

    async fn create(
        &self,
        email: &Email,
        payment_option: PaymentOption,
    ) -> Result<Cart, StoreError> {
        self.check_available()?;
        self.faults.trip(FailPoint::CartCreate)?;

        let mut state = self.state.write().await;
        if state.carts.contains_key(email) {
            return Err(StoreError::AlreadyExists(format!("cart for {}", email)));
        }
        let cart = Cart::new(email.clone(), payment_option);
        state.carts.insert(email.clone(), cart.clone());
        Ok(cart)
    }

    async fn find_or_create(
        &self,
        email: &Email,
        payment_option: PaymentOption,
    ) -> Result<Cart, StoreError> {
        self.check_available()?;

        let mut state = self.state.write().await;
        if let Some(cart) = state.carts.get(email) {
            return Ok(cart.clone());
        }
        self.faults.trip(FailPoint::CartCreate)?;
        let cart = Cart::new(email.clone(), payment_option);
        state.carts.insert(email.clone(), cart.clone());
        Ok(cart)
    }

    async fn save(&self, cart: &Cart) -> Result<Cart, StoreError> {
        self.check_available()?;
        self.faults.trip(FailPoint::CartSave)?;

        let mut state = self.state.write().await;
        let stored = state
            .carts
            .get_mut(&cart.email)
            .ok_or_else(|| StoreError::NotFound(format!("cart for {}", cart.email)))?;

        if stored.version != cart.version {
            return Err(StoreError::Conflict(format!(
                "cart for {} is at version {}, write was based on {}",
                cart.email, stored.version, cart.version
            )));
        }

        let mut saved = cart.clone();
        saved.version += 1;
        saved.updated_at = Utc::now();
        *stored = saved.clone();
        Ok(saved)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.user_by_email(email).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        self.check_available()?;

        let mut state = self.state.write().await;
        if state.user_by_email(&new_user.email).is_some() {
            return Err(StoreError::AlreadyExists(format!(
                "user with email {}",
                new_user.email
            )));
        }
        let user = new_user.into_user();
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_address(&self, user_id: Uuid, address: &str) -> Result<User, StoreError> {
        self.check_available()?;

        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        user.address = address.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl SettlementStore for InMemoryStore {
    async fn settle(&self, settlement: &Settlement) -> Result<SettlementReceipt, StoreError> {
        self.check_available()?;

        let mut state = self.state.write().await;
        if state.settlements.contains_key(&settlement.id) {
            return Err(StoreError::AlreadyExists(format!(
                "settlement {}",
                settlement.id
            )));
        }

        let mut user = state
            .users
            .get(&settlement.user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {}", settlement.user_id)))?;
        let mut cart = state
            .carts
            .get(&settlement.email)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("cart for {}", settlement.email)))?;

        if cart.version != settlement.cart_version {
            return Err(StoreError::Conflict(format!(
                "cart for {} changed during checkout",
                settlement.email
            )));
        }
        if !user.can_afford(settlement.total) {
            return Err(StoreError::InsufficientFunds);
        }

        let receipt = SettlementReceipt::from_settlement(settlement, user.wallet_money);
        user.wallet_money = receipt.wallet_after;
        user.updated_at = Utc::now();

        // Nothing has been written to `state` yet; failing here drops the staged copies.
        self.faults.trip(FailPoint::SettleAfterDebit)?;

        cart.clear();
        cart.version += 1;

        state.users.insert(user.id, user);
        state.carts.insert(cart.email.clone(), cart);
        state.settlements.insert(receipt.id, receipt.clone());
        Ok(receipt)
    }

    async fn find_settlement(&self, id: Uuid) -> Result<Option<SettlementReceipt>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().await.settlements.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn email() -> Email {
        Email::parse("owner@example.com").unwrap()
    }

    #[tokio::test]
    async fn create_twice_reports_already_exists() {
        let store = InMemoryStore::new();
        CartStore::create(&store, &email(), PaymentOption::default())
            .await
            .unwrap();

        let second = CartStore::create(&store, &email(), PaymentOption::default()).await;
        assert_matches!(second, Err(StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn find_or_create_returns_the_existing_cart() {
        let store = InMemoryStore::new();
        let first = store
            .find_or_create(&email(), PaymentOption::default())
            .await
            .unwrap();
        let second = store
            .find_or_create(&email(), PaymentOption::default())
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn concurrent_find_or_create_never_duplicates() {
        let store = InMemoryStore::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .find_or_create(&email(), PaymentOption::default())
                        .await
                        .unwrap()
                        .id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn stale_save_is_rejected() {
        let store = InMemoryStore::new();
        let cart = store
            .find_or_create(&email(), PaymentOption::default())
            .await
            .unwrap();

        let mut first = cart.clone();
        first
            .add_item(Product::new("A", "x", dec!(1)), 1)
            .unwrap();
        let saved = store.save(&first).await.unwrap();
        assert_eq!(saved.version, cart.version + 1);

        let mut second = cart;
        second
            .add_item(Product::new("B", "x", dec!(2)), 1)
            .unwrap();
        assert_matches!(store.save(&second).await, Err(StoreError::Conflict(_)));

        let stored = store.find_by_owner(&email()).await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn unavailable_fail_point_is_one_shot() {
        let store = InMemoryStore::new();
        store.fail_next(FailPoint::Unavailable);
        assert_matches!(store.list().await, Err(StoreError::Unavailable(_)));
        assert!(store.list().await.is_ok());
    }
}
