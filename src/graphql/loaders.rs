use crate::domain::{Category, OrderProduct, Product, Tag, User};
use crate::storage::Storage;
use async_graphql::dataloader::{DataLoader, Loader};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// DataLoader for batching category lookups
pub struct CategoryLoader {
    storage: Arc<dyn Storage>,
}

impl CategoryLoader {
    pub fn new(storage: Arc<dyn Storage>) -> DataLoader<Self> {
        DataLoader::new(Self { storage }, tokio::spawn)
    }
}

#[async_trait]
impl Loader<i64> for CategoryLoader {
    type Value = Category;
    type Error = String;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        let categories = self
            .storage
            .get_categories_by_ids(keys)
            .await
            .map_err(|e| e.to_string())?;
        Ok(categories.into_iter().map(|c| (c.id, c)).collect())
    }
}

/// DataLoader for the tags of many products at once
pub struct TagsLoader {
    storage: Arc<dyn Storage>,
}

impl TagsLoader {
    pub fn new(storage: Arc<dyn Storage>) -> DataLoader<Self> {
        DataLoader::new(Self { storage }, tokio::spawn)
    }
}

#[async_trait]
impl Loader<i64> for TagsLoader {
    type Value = Vec<Tag>;
    type Error = String;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        self.storage
            .get_tags_for_products(keys)
            .await
            .map_err(|e| e.to_string())
    }
}

/// DataLoader for batching product lookups
pub struct ProductLoader {
    storage: Arc<dyn Storage>,
}

impl ProductLoader {
    pub fn new(storage: Arc<dyn Storage>) -> DataLoader<Self> {
        DataLoader::new(Self { storage }, tokio::spawn)
    }
}

#[async_trait]
impl Loader<i64> for ProductLoader {
    type Value = Product;
    type Error = String;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        let products = self
            .storage
            .get_products_by_ids(keys)
            .await
            .map_err(|e| e.to_string())?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }
}

/// DataLoader for batching user lookups
pub struct UserLoader {
    storage: Arc<dyn Storage>,
}

impl UserLoader {
    pub fn new(storage: Arc<dyn Storage>) -> DataLoader<Self> {
        DataLoader::new(Self { storage }, tokio::spawn)
    }
}

#[async_trait]
impl Loader<i64> for UserLoader {
    type Value = User;
    type Error = String;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        let users = self
            .storage
            .get_users_by_ids(keys)
            .await
            .map_err(|e| e.to_string())?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}

/// DataLoader for the line items of many orders at once
pub struct OrderProductsLoader {
    storage: Arc<dyn Storage>,
}

impl OrderProductsLoader {
    pub fn new(storage: Arc<dyn Storage>) -> DataLoader<Self> {
        DataLoader::new(Self { storage }, tokio::spawn)
    }
}

#[async_trait]
impl Loader<Uuid> for OrderProductsLoader {
    type Value = Vec<OrderProduct>;
    type Error = String;

    async fn load(&self, keys: &[Uuid]) -> Result<HashMap<Uuid, Self::Value>, Self::Error> {
        self.storage
            .get_order_products_for_orders(keys)
            .await
            .map_err(|e| e.to_string())
    }
}
