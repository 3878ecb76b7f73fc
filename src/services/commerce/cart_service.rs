use crate::{
    config::CommerceConfig,
    errors::ServiceError,
    models::{Cart, CartError, User},
    repositories::{CartStore, ProductCatalog},
};
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

pub(crate) const PRODUCT_ALREADY_IN_CART: &str =
    "Product already in cart. Use the cart sidebar to update or remove product from cart";
pub(crate) const PRODUCT_NOT_IN_DATABASE: &str = "Product doesn't exist in database";
pub(crate) const NO_CART_USE_POST: &str =
    "User does not have a cart. Use POST to create cart and add a product";
pub(crate) const PRODUCT_NOT_IN_CART: &str = "Product not in cart";
pub(crate) const NO_CART: &str = "User does not have a cart";
pub(crate) const FAILED_TO_CREATE_CART: &str = "Failed to create cart";

/// Shopping cart service: the only writer of carts outside checkout.
///
/// Every mutation follows the same shape: load the owner's cart, apply the
/// line-item rule on the in-memory [`Cart`], then `save` it. `save` is
/// version-checked, so two requests racing on the same cart cannot silently
/// overwrite each other; the loser gets an internal error and can retry.
///
/// # Examples
///
/// ```ignore
/// let cart_service = CartService::new(stores.carts.clone(), stores.products.clone(), commerce);
///
/// let cart = cart_service.add_item(&user, product_id, 2).await?;
/// assert_eq!(cart.items().len(), 1);
/// ```
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductCatalog>,
    commerce: Arc<CommerceConfig>,
}

impl CartService {
    /// Creates a new `CartService` instance.
    ///
    /// # Arguments
    ///
    /// * `carts` - Cart persistence
    /// * `products` - Catalog consulted before a product is admitted to a cart
    /// * `commerce` - Defaults for lazily created carts
    pub fn new(
        carts: Arc<dyn CartStore>,
        products: Arc<dyn ProductCatalog>,
        commerce: Arc<CommerceConfig>,
    ) -> Self {
        Self {
            carts,
            products,
            commerce,
        }
    }

    /// Adds a product to the user's cart, creating the cart on first use.
    ///
    /// The product is snapshotted from the catalog at this moment; later price
    /// changes do not affect the line item.
    ///
    /// # Arguments
    ///
    /// * `user` - Cart owner
    /// * `product_id` - Catalog product to add
    /// * `quantity` - Must be at least 1
    ///
    /// # Returns
    ///
    /// * `Ok(Cart)` - The saved cart including the new line item
    /// * `Err(ServiceError::InvalidRequest)` - Zero quantity, product already in
    ///   the cart, or product missing from the catalog
    /// * `Err(ServiceError::InternalError)` - The cart could not be created or saved
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn add_item(
        &self,
        user: &User,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<Cart, ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::InvalidRequest(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let mut cart = self
            .carts
            .find_or_create(&user.email, self.commerce.default_payment_option)
            .await
            .map_err(|e| {
                error!(error = %e, "cart creation failed");
                ServiceError::InternalError(FAILED_TO_CREATE_CART.to_string())
            })?;

        if cart.contains(product_id) {
            return Err(ServiceError::InvalidRequest(
                PRODUCT_ALREADY_IN_CART.to_string(),
            ));
        }

        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| ServiceError::InvalidRequest(PRODUCT_NOT_IN_DATABASE.to_string()))?;

        cart.add_item(product, quantity).map_err(line_item_error)?;
        let cart = self.carts.save(&cart).await?;

        counter!("qkart_cart.items_added", 1);
        info!(%product_id, quantity, items = cart.len(), "Added product to cart");
        Ok(cart)
    }

    /// Overwrites the quantity of a product already in the cart.
    ///
    /// # Returns
    ///
    /// * `Ok(Cart)` - The saved cart
    /// * `Err(ServiceError::InvalidRequest)` - No cart, unknown product, or the
    ///   product is not in the cart
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn update_item(
        &self,
        user: &User,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<Cart, ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::InvalidRequest(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let mut cart = self
            .carts
            .find_by_owner(&user.email)
            .await?
            .ok_or_else(|| ServiceError::InvalidRequest(NO_CART_USE_POST.to_string()))?;

        if self.products.find_by_id(product_id).await?.is_none() {
            return Err(ServiceError::InvalidRequest(
                PRODUCT_NOT_IN_DATABASE.to_string(),
            ));
        }

        cart.set_quantity(product_id, quantity)
            .map_err(line_item_error)?;
        let cart = self.carts.save(&cart).await?;

        counter!("qkart_cart.items_updated", 1);
        info!(%product_id, quantity, "Updated cart item quantity");
        Ok(cart)
    }

    /// Removes a product from the cart, keeping the order of the remaining items.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn remove_item(&self, user: &User, product_id: Uuid) -> Result<Cart, ServiceError> {
        let mut cart = self
            .carts
            .find_by_owner(&user.email)
            .await?
            .ok_or_else(|| ServiceError::InvalidRequest(NO_CART.to_string()))?;

        cart.remove_item(product_id).map_err(line_item_error)?;
        let cart = self.carts.save(&cart).await?;

        counter!("qkart_cart.items_removed", 1);
        info!(%product_id, items = cart.len(), "Removed product from cart");
        Ok(cart)
    }

    /// Returns the user's cart with its computed total.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn get_cart(&self, user: &User) -> Result<CartView, ServiceError> {
        self.carts
            .find_by_owner(&user.email)
            .await?
            .map(CartView::from)
            .ok_or_else(|| ServiceError::NotFound(NO_CART.to_string()))
    }
}

fn line_item_error(err: CartError) -> ServiceError {
    match err {
        CartError::AlreadyPresent(_) => {
            ServiceError::InvalidRequest(PRODUCT_ALREADY_IN_CART.to_string())
        }
        CartError::NotPresent(_) => ServiceError::InvalidRequest(PRODUCT_NOT_IN_CART.to_string()),
    }
}

/// Read view of a cart as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub total: Decimal,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        let total = cart.total();
        Self { cart, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Email, NewUser, Product};
    use crate::repositories::{FailPoint, InMemoryStore};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn fixture() -> (CartService, InMemoryStore, User, Product) {
        let store = InMemoryStore::new();
        let product = Product::new("Pen", "Stationery", dec!(5));
        store.insert_product(product.clone()).await;
        let backend = Arc::new(store.clone());
        let service = CartService::new(
            backend.clone(),
            backend,
            Arc::new(CommerceConfig::default()),
        );
        let user = NewUser {
            name: "crio-user".into(),
            email: Email::parse("crio-user@gmail.com").unwrap(),
            password_hash: String::new(),
            wallet_money: dec!(500),
            address: "ADDRESS_NOT_SET".into(),
        }
        .into_user();
        (service, store, user, product)
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_touching_storage() {
        let (service, store, user, product) = fixture().await;
        let result = service.add_item(&user, product.id, 0).await;
        assert_matches!(result, Err(ServiceError::InvalidRequest(_)));
        assert!(store.find_by_owner(&user.email).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_cart_creation_is_internal() {
        let (service, store, user, product) = fixture().await;
        store.fail_next(FailPoint::CartCreate);

        let err = service.add_item(&user, product.id, 1).await.unwrap_err();
        assert_matches!(&err, ServiceError::InternalError(msg) if msg == FAILED_TO_CREATE_CART);
    }

    #[tokio::test]
    async fn failed_save_leaves_cart_untouched() {
        let (service, store, user, product) = fixture().await;
        service.add_item(&user, product.id, 1).await.unwrap();

        store.fail_next(FailPoint::CartSave);
        let err = service.update_item(&user, product.id, 9).await.unwrap_err();
        assert_matches!(err, ServiceError::InternalError(_));

        let cart = store.find_by_owner(&user.email).await.unwrap().unwrap();
        assert_eq!(cart.item(product.id).map(|i| i.quantity), Some(1));
    }

    #[tokio::test]
    async fn cart_view_reports_total() {
        let (service, _store, user, product) = fixture().await;
        service.add_item(&user, product.id, 3).await.unwrap();

        let view = service.get_cart(&user).await.unwrap();
        assert_eq!(view.total, dec!(15));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["cartItems"][0]["quantity"], 3);
        assert_eq!(json["paymentOption"], "PAYMENT_OPTION_DEFAULT");
    }
}
