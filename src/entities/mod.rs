//! SeaORM entities for the tables created by the `migrations` crate.
//!
//! These mirror storage rows only. Domain types live in `crate::models` and
//! the conversions between the two are in `repositories::sea_orm_store`.

pub mod cart;
pub mod cart_item;
pub mod product;
pub mod settlement;
pub mod user;
