/// Commerce services module - cart, checkout and catalog logic
pub mod cart_service;
pub mod checkout_service;
pub mod product_catalog_service;

// Re-export services for convenience
pub use cart_service::{CartService, CartView};
pub use checkout_service::{
    CheckoutReceipt, CheckoutRejection, CheckoutService, ValidatedCheckout,
};
pub use product_catalog_service::ProductCatalogService;
