//! Seed data script - populates the catalog with demo products
//!
//! Run with: cargo run --bin seed-data
//!
//! Uses the same configuration as the server (`config/` plus `APP__*`
//! variables), runs migrations, then inserts the products below.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::info;

use qkart_api::{
    config,
    db,
    models::Product,
    repositories::{ProductCatalog, SeaOrmStore},
};
use std::collections::HashSet;

fn catalog() -> Vec<Product> {
    let rows: [(&str, &str, Decimal, i32); 10] = [
        ("Apple iPhone 14", "Phones", dec!(799), 5),
        ("OnePlus Nord CE", "Phones", dec!(299), 4),
        ("Noise Cancelling Headphones", "Electronics", dec!(199), 4),
        ("Smart Fitness Band", "Electronics", dec!(49), 3),
        ("Classic Leather Wallet", "Accessories", dec!(35), 4),
        ("Running Shoes", "Fashion", dec!(89), 5),
        ("Cotton Crew T-Shirt", "Fashion", dec!(15), 3),
        ("Stainless Steel Bottle", "Home & Kitchen", dec!(20), 4),
        ("Ceramic Coffee Mug", "Home & Kitchen", dec!(12), 3),
        ("Mechanical Keyboard", "Computers", dec!(120), 5),
    ];

    rows.into_iter()
        .map(|(name, category, cost, rating)| {
            let mut product = Product::new(name, category, cost);
            product.rating = rating;
            product.image = format!(
                "https://static.qkart.dev/products/{}.png",
                name.to_lowercase().replace(' ', "-")
            );
            product
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("=== QKart Seed Data ===");
    let pool = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&pool).await?;
    let store = SeaOrmStore::new(Arc::new(pool));

    let existing: HashSet<String> = store.list().await?.into_iter().map(|p| p.name).collect();

    let mut created = 0;
    for product in catalog() {
        if existing.contains(&product.name) {
            info!(name = %product.name, "already present");
            continue;
        }
        store.insert_product(&product).await?;
        created += 1;
    }

    info!("Created {} products", created);
    info!("Try: curl http://localhost:{}/v1/products", cfg.port);
    Ok(())
}
