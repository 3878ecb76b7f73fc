// User accounts
pub mod users;

// Cart, checkout and catalog
pub mod commerce;
