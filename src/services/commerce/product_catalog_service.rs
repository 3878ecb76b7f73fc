use crate::{errors::ServiceError, models::Product, repositories::ProductCatalog};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Read-only product catalog service
#[derive(Clone)]
pub struct ProductCatalogService {
    products: Arc<dyn ProductCatalog>,
}

impl ProductCatalogService {
    pub fn new(products: Arc<dyn ProductCatalog>) -> Self {
        Self { products }
    }

    /// Get product by ID
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<Product, ServiceError> {
        self.products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// List every product, ordered by name
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        let products = self.products.list().await?;
        debug!(count = products.len(), "Listed products");
        Ok(products)
    }
}
