//! Domain models shared by the stores, services and HTTP handlers.

pub mod cart;
pub mod email;
pub mod product;
pub mod settlement;
pub mod user;

pub use cart::{Cart, CartError, CartItem, PaymentOption};
pub use email::{Email, EmailError};
pub use product::Product;
pub use settlement::{Settlement, SettlementReceipt};
pub use user::{NewUser, User, UserAddress};
