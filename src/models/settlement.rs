use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Email;

/// A validated checkout handed to the store for atomic commit.
///
/// The store debits `total` from the user's wallet, clears the cart and
/// records the receipt in one unit. `cart_version` is the version the
/// checkout was validated against; a cart written since then fails the
/// commit instead of being cleared unseen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: Email,
    pub total: Decimal,
    pub cart_version: i64,
    pub item_count: u32,
}

/// Durable record of a committed settlement. Its id doubles as the
/// idempotency key of the checkout that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: Email,
    pub total: Decimal,
    pub wallet_before: Decimal,
    pub wallet_after: Decimal,
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
}

impl SettlementReceipt {
    pub fn from_settlement(settlement: &Settlement, wallet_before: Decimal) -> Self {
        Self {
            id: settlement.id,
            user_id: settlement.user_id,
            email: settlement.email.clone(),
            total: settlement.total,
            wallet_before,
            wallet_after: wallet_before - settlement.total,
            item_count: settlement.item_count,
            created_at: Utc::now(),
        }
    }
}
