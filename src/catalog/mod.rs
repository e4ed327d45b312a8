//! Product lookup used when orders are placed. Weight and value are read
//! here once and copied onto each order.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AppError;
use crate::models::product::Product;

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get(&self, product_id: i64) -> Result<Option<Product>, AppError>;

    async fn upsert(&self, product: Product) -> Result<Product, AppError>;
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: DashMap<i64, Product>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn get(&self, product_id: i64) -> Result<Option<Product>, AppError> {
        Ok(self
            .products
            .get(&product_id)
            .map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, product: Product) -> Result<Product, AppError> {
        if product.name.trim().is_empty() {
            return Err(AppError::Validation("name cannot be empty".to_string()));
        }
        if product.weight < 0 || product.value < 0 {
            return Err(AppError::Validation(
                "weight and value must be >= 0".to_string(),
            ));
        }

        self.products.insert(product.product_id, product.clone());
        Ok(product)
    }
}
