use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Email;

/// A registered account together with its wallet and shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: Email,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub wallet_money: Decimal,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the address differs from the configured "not set" sentinel.
    pub fn has_set_non_default_address(&self, default_address: &str) -> bool {
        self.address != default_address
    }

    pub fn can_afford(&self, amount: Decimal) -> bool {
        self.wallet_money >= amount
    }

    pub fn address_view(&self) -> UserAddress {
        UserAddress {
            id: self.id,
            email: self.email.clone(),
            address: self.address.clone(),
        }
    }
}

/// Fields needed to insert a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub wallet_money: Decimal,
    pub address: String,
}

impl NewUser {
    pub fn into_user(self) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            wallet_money: self.wallet_money,
            address: self.address,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Id, email and address projection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAddress {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: Email,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn user(address: &str, wallet: Decimal) -> User {
        NewUser {
            name: "crio-user".into(),
            email: Email::parse("crio-user@gmail.com").unwrap(),
            password_hash: "$argon2id$fake".into(),
            wallet_money: wallet,
            address: address.into(),
        }
        .into_user()
    }

    #[test]
    fn default_address_sentinel_means_unset() {
        assert!(!user("ADDRESS_NOT_SET", dec!(10)).has_set_non_default_address("ADDRESS_NOT_SET"));
        assert!(user("221B Baker Street, London", dec!(10))
            .has_set_non_default_address("ADDRESS_NOT_SET"));
    }

    #[test]
    fn serialised_user_hides_password_hash() {
        let json = serde_json::to_value(user("ADDRESS_NOT_SET", dec!(500))).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["walletMoney"], serde_json::json!("500"));
        assert_eq!(json["email"], serde_json::json!("crio-user@gmail.com"));
    }

    #[test]
    fn can_afford_is_inclusive() {
        let u = user("x", dec!(60));
        assert!(u.can_afford(dec!(60)));
        assert!(!u.can_afford(dec!(60.01)));
    }
}
