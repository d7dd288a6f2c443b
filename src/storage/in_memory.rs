use super::rank_product_sales;
use super::traits::Storage;
use crate::constants;
use crate::domain::*;
use crate::error::{Result, ShopError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    next_id: i64,
    products: BTreeMap<i64, Product>,
    categories: BTreeMap<i64, Category>,
    tags: BTreeMap<i64, Tag>,
    users: BTreeMap<i64, User>,
    orders: HashMap<Uuid, Order>,
    order_products: BTreeMap<i64, OrderProduct>,
    stores: BTreeMap<i64, Store>,
    task_results: VecDeque<TaskResult>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory storage implementation for development/testing.
///
/// Every table sits behind one lock so that multi-row writes are atomic.
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_product(&self, product: &mut Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(category_id) = product.category_id {
            if !tables.categories.contains_key(&category_id) {
                return Err(ShopError::not_found("Category", category_id));
            }
        }
        product.id = tables.allocate_id();
        product.created_at = Utc::now();
        tables.products.insert(product.id, product.clone());

        debug!("Created product: {} with id {}", product.title, product.id);
        Ok(())
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.get(&id).cloned())
    }

    async fn get_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn list_products(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let page = tables
            .products
            .values()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(page)
    }

    async fn count_products(&self) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables.products.len() as i64)
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(category_id) = product.category_id {
            if !tables.categories.contains_key(&category_id) {
                return Err(ShopError::not_found("Category", category_id));
            }
        }
        match tables.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                debug!("Updated product: {} with id {}", product.title, product.id);
                Ok(())
            }
            None => Err(ShopError::not_found("Product", product.id)),
        }
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.products.contains_key(&id) {
            return Ok(false);
        }
        if tables.order_products.values().any(|op| op.product_id == id) {
            return Err(ShopError::Validation(format!(
                "Product {id} is referenced by existing orders"
            )));
        }
        tables.products.remove(&id);
        debug!("Deleted product with id {}", id);
        Ok(true)
    }

    async fn set_product_tags(&self, product_id: i64, tag_ids: &[i64]) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(missing) = tag_ids.iter().find(|id| !tables.tags.contains_key(id)) {
            return Err(ShopError::not_found("Tag", missing));
        }
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or_else(|| ShopError::not_found("Product", product_id))?;

        let mut ids = tag_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        product.tag_ids = ids;
        Ok(())
    }

    async fn create_category(&self, category: &mut Category) -> Result<()> {
        let mut tables = self.tables.write().await;
        category.id = tables.allocate_id();
        tables.categories.insert(category.id, category.clone());

        debug!("Created category: {} with id {}", category.name, category.id);
        Ok(())
    }

    async fn get_categories_by_ids(&self, ids: &[i64]) -> Result<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.categories.get(id).cloned())
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().cloned().collect())
    }

    async fn create_tag(&self, tag: &mut Tag) -> Result<()> {
        let mut tables = self.tables.write().await;
        tag.id = tables.allocate_id();
        tables.tags.insert(tag.id, tag.clone());

        debug!("Created tag: {} with id {}", tag.name, tag.id);
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tables = self.tables.read().await;
        Ok(tables.tags.values().cloned().collect())
    }

    async fn get_tags_for_products(&self, product_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
        let tables = self.tables.read().await;
        let mut map = HashMap::new();
        for id in product_ids {
            if let Some(product) = tables.products.get(id) {
                let tags = product
                    .tag_ids
                    .iter()
                    .filter_map(|tag_id| tables.tags.get(tag_id).cloned())
                    .collect();
                map.insert(*id, tags);
            }
        }
        Ok(map)
    }

    async fn create_user(&self, user: &mut User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(ShopError::Validation(format!(
                "Username {} is already taken",
                user.username
            )));
        }
        user.id = tables.allocate_id();
        user.created_at = Utc::now();
        tables.users.insert(user.id, user.clone());

        debug!("Created user: {} with id {}", user.username, user.id);
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn create_order(&self, new_order: NewOrder) -> Result<(Order, Vec<OrderProduct>)> {
        let mut tables = self.tables.write().await;

        // Check every reference before touching any table
        if !tables.users.contains_key(&new_order.user_id) {
            return Err(ShopError::not_found("User", new_order.user_id));
        }
        if let Some(item) = new_order
            .items
            .iter()
            .find(|item| !tables.products.contains_key(&item.product_id))
        {
            return Err(ShopError::not_found("Product", item.product_id));
        }

        let now = Utc::now();
        let order = Order {
            uuid: Uuid::new_v4(),
            user_id: new_order.user_id,
            display_number: new_order.display_number,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(order.uuid, order.clone());

        let mut items = Vec::with_capacity(new_order.items.len());
        for item in new_order.items {
            let order_product = OrderProduct {
                id: tables.allocate_id(),
                order_uuid: order.uuid,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            };
            tables
                .order_products
                .insert(order_product.id, order_product.clone());
            items.push(order_product);
        }

        debug!("Created order {} with {} items", order.uuid, items.len());
        Ok((order, items))
    }

    async fn get_order(&self, uuid: Uuid) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&uuid).cloned())
    }

    async fn list_orders(&self, user_id: Option<i64>) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| user_id.map_or(true, |id| o.user_id == id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.uuid.cmp(&b.uuid)));
        Ok(orders)
    }

    async fn delete_order(&self, uuid: Uuid) -> Result<Option<Order>> {
        let mut tables = self.tables.write().await;
        let removed = tables.orders.remove(&uuid);
        if removed.is_some() {
            tables.order_products.retain(|_, op| op.order_uuid != uuid);
            debug!("Deleted order {}", uuid);
        }
        Ok(removed)
    }

    async fn get_order_products(&self, order_uuid: Uuid) -> Result<Vec<OrderProduct>> {
        let tables = self.tables.read().await;
        Ok(tables
            .order_products
            .values()
            .filter(|op| op.order_uuid == order_uuid)
            .cloned()
            .collect())
    }

    async fn get_order_products_for_orders(
        &self,
        order_uuids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<OrderProduct>>> {
        let tables = self.tables.read().await;
        let mut map: HashMap<Uuid, Vec<OrderProduct>> = HashMap::new();
        for op in tables.order_products.values() {
            if order_uuids.contains(&op.order_uuid) {
                map.entry(op.order_uuid).or_default().push(op.clone());
            }
        }
        Ok(map)
    }

    async fn orders_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.created_at >= start && o.created_at <= end)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn top_products(&self, order_uuids: &[Uuid], limit: usize) -> Result<Vec<ProductSales>> {
        let tables = self.tables.read().await;
        let items: Vec<OrderProduct> = tables
            .order_products
            .values()
            .filter(|op| order_uuids.contains(&op.order_uuid))
            .cloned()
            .collect();
        let titles: HashMap<i64, String> = tables
            .products
            .values()
            .map(|p| (p.id, p.title.clone()))
            .collect();
        Ok(rank_product_sales(&items, &titles, limit))
    }

    async fn create_store(&self, store: &mut Store) -> Result<()> {
        let mut tables = self.tables.write().await;
        store.id = tables.allocate_id();
        tables.stores.insert(store.id, store.clone());

        debug!("Created store: {} with id {}", store.name, store.id);
        Ok(())
    }

    async fn list_featured_stores(&self) -> Result<Vec<Store>> {
        let tables = self.tables.read().await;
        Ok(tables.stores.values().filter(|s| s.featured).cloned().collect())
    }

    async fn record_task_result(&self, result: &TaskResult) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.task_results.push_back(result.clone());
        while tables.task_results.len() > constants::IN_MEMORY_TASK_RESULTS_CAP {
            tables.task_results.pop_front();
        }
        Ok(())
    }

    async fn list_task_results(&self, limit: usize) -> Result<Vec<TaskResult>> {
        let tables = self.tables.read().await;
        let mut results: Vec<TaskResult> = tables.task_results.iter().cloned().collect();
        results.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        results.truncate(limit);
        Ok(results)
    }
}
