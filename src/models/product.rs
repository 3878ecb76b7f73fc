use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product. Read-only reference data from the cart's point of view;
/// line items keep their own copy taken when the product was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub cost: Decimal,
    pub rating: i32,
    pub image: String,
}

impl Product {
    pub fn new(name: impl Into<String>, category: impl Into<String>, cost: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: category.into(),
            cost,
            rating: 0,
            image: String::new(),
        }
    }
}
