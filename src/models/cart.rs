use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::{Email, Product};

/// Payment option selected on a cart.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOption {
    #[default]
    PaymentOptionDefault,
}

/// Violations of the cart's line-item rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("product {0} is already in the cart")]
    AlreadyPresent(Uuid),
    #[error("product {0} is not in the cart")]
    NotPresent(Uuid),
}

/// A product snapshot and the quantity ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product: Product, quantity: u32) -> Self {
        Self { product, quantity }
    }

    pub fn product_id(&self) -> Uuid {
        self.product.id
    }

    /// Captured unit cost times quantity.
    pub fn line_total(&self) -> Decimal {
        self.product.cost * Decimal::from(self.quantity)
    }
}

/// A user's cart, keyed by the owner's email.
///
/// Line items keep insertion order and hold at most one entry per product id.
/// `version` is bumped by the store on every successful save and is how
/// concurrent writers detect that they raced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: Email,
    pub cart_items: Vec<CartItem>,
    pub payment_option: PaymentOption,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(email: Email, payment_option: PaymentOption) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            cart_items: Vec::new(),
            payment_option,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.cart_items
    }

    pub fn is_empty(&self) -> bool {
        self.cart_items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cart_items.len()
    }

    /// Index of the line item for `product_id`, first match.
    pub fn position(&self, product_id: Uuid) -> Option<usize> {
        self.cart_items
            .iter()
            .position(|item| item.product_id() == product_id)
    }

    pub fn contains(&self, product_id: Uuid) -> bool {
        self.position(product_id).is_some()
    }

    pub fn item(&self, product_id: Uuid) -> Option<&CartItem> {
        self.cart_items
            .iter()
            .find(|item| item.product_id() == product_id)
    }

    /// Appends a new line item. Fails if the product already has one.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> Result<(), CartError> {
        if self.contains(product.id) {
            return Err(CartError::AlreadyPresent(product.id));
        }
        self.cart_items.push(CartItem::new(product, quantity));
        self.touch();
        Ok(())
    }

    /// Overwrites the quantity of an existing line item in place.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let index = self
            .position(product_id)
            .ok_or(CartError::NotPresent(product_id))?;
        if let Some(item) = self.cart_items.get_mut(index) {
            item.quantity = quantity;
        }
        self.touch();
        Ok(())
    }

    /// Removes the line item for `product_id`, keeping the order of the rest.
    pub fn remove_item(&mut self, product_id: Uuid) -> Result<CartItem, CartError> {
        let index = self
            .position(product_id)
            .ok_or(CartError::NotPresent(product_id))?;
        let removed = self.cart_items.remove(index);
        self.touch();
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.cart_items.clear();
        self.touch();
    }

    /// Sum of captured unit cost times quantity over all line items.
    pub fn total(&self) -> Decimal {
        self.cart_items.iter().map(CartItem::line_total).sum()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
