use crate::{
    config::CommerceConfig,
    errors::ServiceError,
    models::{Cart, Settlement, SettlementReceipt, User},
    repositories::{CartStore, SettlementStore, StoreError, UserStore},
};
use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::cart_service::NO_CART;

/// Why a checkout was turned down before anything was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutRejection {
    NoCart,
    EmptyCart,
    UserNotFound,
    AddressNotSet,
    InsufficientBalance,
}

impl CheckoutRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoCart => "no_cart",
            Self::EmptyCart => "empty_cart",
            Self::UserNotFound => "user_not_found",
            Self::AddressNotSet => "address_not_set",
            Self::InsufficientBalance => "insufficient_balance",
        }
    }
}

impl From<CheckoutRejection> for ServiceError {
    fn from(rejection: CheckoutRejection) -> Self {
        match rejection {
            CheckoutRejection::NoCart => ServiceError::NotFound(NO_CART.to_string()),
            CheckoutRejection::EmptyCart => {
                ServiceError::InvalidRequest("Cart does not have any products".to_string())
            }
            CheckoutRejection::UserNotFound => {
                ServiceError::NotFound("User not found".to_string())
            }
            CheckoutRejection::AddressNotSet => ServiceError::InvalidRequest(
                "User must set a non-default address to checkout".to_string(),
            ),
            CheckoutRejection::InsufficientBalance => ServiceError::InvalidRequest(
                "User does not have enough balance to checkout".to_string(),
            ),
        }
    }
}

/// A checkout whose cart and user passed every precondition.
///
/// Only [`ValidatedCheckout::validate`] builds one, so holding a value means
/// the total was computed from the line-item snapshots of a non-empty cart
/// owned by a user with a real address and enough money at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheckout {
    settlement: Settlement,
}

impl ValidatedCheckout {
    pub fn validate(
        settlement_id: Uuid,
        cart: &Cart,
        user: &User,
        default_address: &str,
    ) -> Result<Self, CheckoutRejection> {
        if cart.is_empty() {
            return Err(CheckoutRejection::EmptyCart);
        }
        if !user.has_set_non_default_address(default_address) {
            return Err(CheckoutRejection::AddressNotSet);
        }

        let total: Decimal = cart.total();
        if !user.can_afford(total) {
            return Err(CheckoutRejection::InsufficientBalance);
        }

        Ok(Self {
            settlement: Settlement {
                id: settlement_id,
                user_id: user.id,
                email: user.email.clone(),
                total,
                cart_version: cart.version,
                item_count: cart.len() as u32,
            },
        })
    }

    pub fn total(&self) -> Decimal {
        self.settlement.total
    }

    pub fn settlement(&self) -> &Settlement {
        &self.settlement
    }
}

/// Outcome of a successful checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    #[serde(flatten)]
    pub settlement: SettlementReceipt,
    /// True when an earlier checkout with the same idempotency key was returned.
    pub replayed: bool,
}

/// Checkout service converting a cart into a wallet debit.
#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    users: Arc<dyn UserStore>,
    settlements: Arc<dyn SettlementStore>,
    commerce: Arc<CommerceConfig>,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<dyn CartStore>,
        users: Arc<dyn UserStore>,
        settlements: Arc<dyn SettlementStore>,
        commerce: Arc<CommerceConfig>,
    ) -> Self {
        Self {
            carts,
            users,
            settlements,
            commerce,
        }
    }

    /// Settles the user's cart against their wallet.
    ///
    /// Validation runs on a fresh read of the cart and the user. The debit,
    /// the cart clear and the receipt are then committed together by the
    /// settlement store, guarded by the cart version read here and by a
    /// balance check at commit time. Nothing is written on any error.
    ///
    /// With an `idempotency_key` that already names a settlement of this user,
    /// the stored receipt is returned and nothing is debited again.
    #[instrument(skip(self, user), fields(email = %user.email, user_id = %user.id))]
    pub async fn checkout(
        &self,
        user: &User,
        idempotency_key: Option<Uuid>,
    ) -> Result<CheckoutReceipt, ServiceError> {
        if let Some(key) = idempotency_key {
            if let Some(receipt) = self.replay(user, key).await? {
                return Ok(receipt);
            }
        }

        let validated = match self.validate(user, idempotency_key).await {
            Ok(validated) => validated,
            Err(CheckoutOutcome::Rejected(rejection)) => {
                counter!("qkart_checkout.rejected", 1, "reason" => rejection.reason());
                info!(reason = rejection.reason(), "Checkout rejected");
                return Err(rejection.into());
            }
            Err(CheckoutOutcome::Failed(err)) => {
                counter!("qkart_checkout.failed", 1);
                return Err(err);
            }
        };

        match self.settlements.settle(validated.settlement()).await {
            Ok(receipt) => {
                counter!("qkart_checkout.settled", 1);
                info!(
                    settlement_id = %receipt.id,
                    total = %receipt.total,
                    wallet_after = %receipt.wallet_after,
                    "Checkout settled"
                );
                Ok(CheckoutReceipt {
                    settlement: receipt,
                    replayed: false,
                })
            }
            Err(StoreError::AlreadyExists(_)) if idempotency_key.is_some() => {
                // A concurrent request with the same key committed first.
                let key = validated.settlement().id;
                self.replay(user, key).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!("settlement {} vanished", key))
                })
            }
            Err(err) => {
                counter!("qkart_checkout.failed", 1);
                warn!(error = %err, "Checkout settlement failed");
                Err(err.into())
            }
        }
    }

    async fn validate(
        &self,
        user: &User,
        idempotency_key: Option<Uuid>,
    ) -> Result<ValidatedCheckout, CheckoutOutcome> {
        let cart = self
            .carts
            .find_by_owner(&user.email)
            .await
            .map_err(|e| CheckoutOutcome::Failed(e.into()))?
            .ok_or(CheckoutOutcome::Rejected(CheckoutRejection::NoCart))?;

        if cart.is_empty() {
            return Err(CheckoutOutcome::Rejected(CheckoutRejection::EmptyCart));
        }

        let fresh_user = self
            .users
            .find_by_id(user.id)
            .await
            .map_err(|e| CheckoutOutcome::Failed(e.into()))?
            .ok_or(CheckoutOutcome::Rejected(CheckoutRejection::UserNotFound))?;

        ValidatedCheckout::validate(
            idempotency_key.unwrap_or_else(Uuid::new_v4),
            &cart,
            &fresh_user,
            &self.commerce.default_address,
        )
        .map_err(CheckoutOutcome::Rejected)
    }

    async fn replay(
        &self,
        user: &User,
        key: Uuid,
    ) -> Result<Option<CheckoutReceipt>, ServiceError> {
        match self.settlements.find_settlement(key).await? {
            Some(receipt) if receipt.user_id == user.id => {
                counter!("qkart_checkout.replayed", 1);
                info!(settlement_id = %key, "Returning existing settlement for idempotency key");
                Ok(Some(CheckoutReceipt {
                    settlement: receipt,
                    replayed: true,
                }))
            }
            Some(_) => Err(ServiceError::AlreadyExists(
                "Idempotency key already used".to_string(),
            )),
            None => Ok(None),
        }
    }
}

enum CheckoutOutcome {
    Rejected(CheckoutRejection),
    Failed(ServiceError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Email, NewUser, PaymentOption, Product};
    use rust_decimal_macros::dec;

    fn user(address: &str, wallet: Decimal) -> User {
        NewUser {
            name: "crio-user".into(),
            email: Email::parse("crio-user@gmail.com").unwrap(),
            password_hash: String::new(),
            wallet_money: wallet,
            address: address.into(),
        }
        .into_user()
    }

    fn cart_with(items: &[(Decimal, u32)]) -> Cart {
        let mut cart = Cart::new(
            Email::parse("crio-user@gmail.com").unwrap(),
            PaymentOption::default(),
        );
        for (cost, qty) in items {
            cart.add_item(Product::new("p", "c", *cost), *qty).unwrap();
        }
        cart
    }

    const ADDRESS: &str = "221B Baker Street, London NW1";

    #[test]
    fn validate_rejections_in_order() {
        let id = Uuid::new_v4();
        assert_eq!(
            ValidatedCheckout::validate(id, &cart_with(&[]), &user(ADDRESS, dec!(0)), "ADDRESS_NOT_SET"),
            Err(CheckoutRejection::EmptyCart)
        );
        assert_eq!(
            ValidatedCheckout::validate(
                id,
                &cart_with(&[(dec!(30), 2)]),
                &user("ADDRESS_NOT_SET", dec!(0)),
                "ADDRESS_NOT_SET"
            ),
            Err(CheckoutRejection::AddressNotSet)
        );
        assert_eq!(
            ValidatedCheckout::validate(
                id,
                &cart_with(&[(dec!(30), 2)]),
                &user(ADDRESS, dec!(50)),
                "ADDRESS_NOT_SET"
            ),
            Err(CheckoutRejection::InsufficientBalance)
        );
    }

    #[test]
    fn validated_checkout_captures_total_and_version() {
        let cart = cart_with(&[(dec!(30), 2), (dec!(2.50), 4)]);
        let validated = ValidatedCheckout::validate(
            Uuid::new_v4(),
            &cart,
            &user(ADDRESS, dec!(100)),
            "ADDRESS_NOT_SET",
        )
        .unwrap();

        assert_eq!(validated.total(), dec!(70));
        assert_eq!(validated.settlement().cart_version, cart.version);
        assert_eq!(validated.settlement().item_count, 2);
    }

    #[test]
    fn exact_balance_is_enough() {
        let validated = ValidatedCheckout::validate(
            Uuid::new_v4(),
            &cart_with(&[(dec!(30), 2)]),
            &user(ADDRESS, dec!(60)),
            "ADDRESS_NOT_SET",
        );
        assert!(validated.is_ok());
    }
}
