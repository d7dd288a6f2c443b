use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Storage trait for persisting catalog, order, store and task-result data.
///
/// `create_*` methods taking `&mut` assign the generated id (and timestamps
/// where the entity has them) back onto the passed value.
#[async_trait]
pub trait Storage: Send + Sync {
    // Product operations
    async fn create_product(&self, product: &mut Product) -> Result<()>;
    async fn get_product(&self, id: i64) -> Result<Option<Product>>;
    async fn get_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>>;
    /// Products ordered by id ascending
    async fn list_products(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Product>>;
    async fn count_products(&self) -> Result<i64>;
    async fn update_product(&self, product: &Product) -> Result<()>;
    /// Returns false when no such product exists
    async fn delete_product(&self, id: i64) -> Result<bool>;
    async fn set_product_tags(&self, product_id: i64, tag_ids: &[i64]) -> Result<()>;

    // Category operations
    async fn create_category(&self, category: &mut Category) -> Result<()>;
    async fn get_categories_by_ids(&self, ids: &[i64]) -> Result<Vec<Category>>;
    async fn list_categories(&self) -> Result<Vec<Category>>;

    // Tag operations
    async fn create_tag(&self, tag: &mut Tag) -> Result<()>;
    async fn list_tags(&self) -> Result<Vec<Tag>>;
    async fn get_tags_for_products(&self, product_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>>;

    // User operations
    async fn create_user(&self, user: &mut User) -> Result<()>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;

    // Order operations
    /// Writes the order and all of its items atomically
    async fn create_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderProduct>)>;
    async fn get_order(&self, uuid: Uuid) -> Result<Option<Order>>;
    /// Orders ordered by creation time, optionally restricted to one user
    async fn list_orders(&self, user_id: Option<i64>) -> Result<Vec<Order>>;
    /// Removes the order and its items, returning the removed order
    async fn delete_order(&self, uuid: Uuid) -> Result<Option<Order>>;
    async fn get_order_products(&self, order_uuid: Uuid) -> Result<Vec<OrderProduct>>;
    async fn get_order_products_for_orders(
        &self,
        order_uuids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<OrderProduct>>>;
    /// Orders whose `created_at` lies within `[start, end]`
    async fn orders_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>>;
    /// Units sold per product across the given orders, best sellers first
    async fn top_products(&self, order_uuids: &[Uuid], limit: usize) -> Result<Vec<ProductSales>>;

    // Store operations
    async fn create_store(&self, store: &mut Store) -> Result<()>;
    async fn list_featured_stores(&self) -> Result<Vec<Store>>;

    // Task result operations
    async fn record_task_result(&self, result: &TaskResult) -> Result<()>;
    /// Most recently finished first
    async fn list_task_results(&self, limit: usize) -> Result<Vec<TaskResult>>;
}
