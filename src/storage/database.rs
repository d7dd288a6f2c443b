use super::rank_product_sales;
use super::traits::Storage;
use crate::db::DatabaseManager;
use crate::domain::*;
use crate::error::{Result, ShopError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::params::Params;
use libsql::{Connection, Row, Rows, Value};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const PRODUCT_COLUMNS: &str =
    "id, title, description, price, summary, is_18_plus, category_id, created_at";
const ORDER_COLUMNS: &str = "uuid, user_id, display_number, created_at, updated_at";
const ORDER_PRODUCT_COLUMNS: &str = "id, order_uuid, product_id, quantity, price";
const STORE_COLUMNS: &str =
    "id, name, country, city, address, square, employees_num, inventory, notes, opened_date, featured";

/// libSQL-backed storage; the schema comes from `DatabaseManager::run_migrations`.
pub struct DatabaseStorage {
    db: DatabaseManager,
}

impl DatabaseStorage {
    pub async fn new(db: DatabaseManager) -> Result<Self> {
        Ok(Self { db })
    }

    async fn conn(&self) -> Result<Connection> {
        self.db.get_connection().await
    }

    async fn attach_tags(&self, conn: &Connection, products: &mut [Product]) -> Result<()> {
        if products.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let sql = format!(
            "SELECT product_id, tag_id FROM product_tags WHERE product_id IN ({}) ORDER BY tag_id",
            placeholders(ids.len())
        );
        let mut rows = conn
            .query(&sql, int_params(&ids))
            .await
            .map_err(|e| db_err("query product tags", e))?;

        let mut by_product: HashMap<i64, Vec<i64>> = HashMap::new();
        while let Some(row) = next_row(&mut rows).await? {
            by_product.entry(int(&row, 0)?).or_default().push(int(&row, 1)?);
        }
        for product in products.iter_mut() {
            product.tag_ids = by_product.remove(&product.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn query_products(&self, sql: &str, params: Params) -> Result<Vec<Product>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| db_err("query products", e))?;
        let mut products = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            products.push(product_from_row(&row)?);
        }
        self.attach_tags(&conn, &mut products).await?;
        Ok(products)
    }

    async fn query_orders(&self, sql: &str, params: Params) -> Result<Vec<Order>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| db_err("query orders", e))?;
        let mut orders = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            orders.push(order_from_row(&row)?);
        }
        Ok(orders)
    }

    async fn query_order_products(&self, sql: &str, params: Params) -> Result<Vec<OrderProduct>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| db_err("query order products", e))?;
        let mut items = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            items.push(order_product_from_row(&row)?);
        }
        Ok(items)
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn create_product(&self, product: &mut Product) -> Result<()> {
        let conn = self.conn().await?;
        product.created_at = Utc::now();
        conn.execute(
            "INSERT INTO products (title, description, price, summary, is_18_plus, category_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                product.title.clone(),
                product.description.clone(),
                product.price.to_string(),
                product.summary.clone(),
                i64::from(product.is_18_plus),
                product.category_id,
                ts(&product.created_at)
            ],
        )
        .await
        .map_err(|e| db_err("insert product", e))?;
        product.id = conn.last_insert_rowid();

        debug!("Created product: {} with id {}", product.title, product.id);
        Ok(())
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let products = self
            .query_products(&sql, Params::Positional(vec![Value::Integer(id)]))
            .await?;
        Ok(products.into_iter().next())
    }

    async fn get_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        self.query_products(&sql, int_params(ids)).await
    }

    async fn list_products(&self, offset: usize, limit: Option<usize>) -> Result<Vec<Product>> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map_or(-1, |l| l as i64);
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id LIMIT ? OFFSET ?");
        self.query_products(
            &sql,
            Params::Positional(vec![Value::Integer(limit), Value::Integer(offset as i64)]),
        )
        .await
    }

    async fn count_products(&self) -> Result<i64> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM products", ())
            .await
            .map_err(|e| db_err("count products", e))?;
        match next_row(&mut rows).await? {
            Some(row) => int(&row, 0),
            None => Ok(0),
        }
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let conn = self.conn().await?;
        let changed = conn
            .execute(
                "UPDATE products SET title = ?, description = ?, price = ?, summary = ?, is_18_plus = ?, category_id = ? WHERE id = ?",
                libsql::params![
                    product.title.clone(),
                    product.description.clone(),
                    product.price.to_string(),
                    product.summary.clone(),
                    i64::from(product.is_18_plus),
                    product.category_id,
                    product.id
                ],
            )
            .await
            .map_err(|e| db_err("update product", e))?;
        if changed == 0 {
            return Err(ShopError::not_found("Product", product.id));
        }
        debug!("Updated product: {} with id {}", product.title, product.id);
        Ok(())
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM order_products WHERE product_id = ?",
                libsql::params![id],
            )
            .await
            .map_err(|e| db_err("check product references", e))?;
        let referenced = match next_row(&mut rows).await? {
            Some(row) => int(&row, 0)? > 0,
            None => false,
        };
        if referenced {
            return Err(ShopError::Validation(format!(
                "Product {id} is referenced by existing orders"
            )));
        }

        let deleted = conn
            .execute("DELETE FROM products WHERE id = ?", libsql::params![id])
            .await
            .map_err(|e| db_err("delete product", e))?;
        Ok(deleted > 0)
    }

    async fn set_product_tags(&self, product_id: i64, tag_ids: &[i64]) -> Result<()> {
        let conn = self.conn().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| db_err("begin transaction", e))?;

        let mut rows = tx
            .query("SELECT id FROM products WHERE id = ?", libsql::params![product_id])
            .await
            .map_err(|e| db_err("check product", e))?;
        if next_row(&mut rows).await?.is_none() {
            return Err(ShopError::not_found("Product", product_id));
        }

        tx.execute(
            "DELETE FROM product_tags WHERE product_id = ?",
            libsql::params![product_id],
        )
        .await
        .map_err(|e| db_err("clear product tags", e))?;
        for tag_id in tag_ids {
            tx.execute(
                "INSERT OR IGNORE INTO product_tags (product_id, tag_id) VALUES (?, ?)",
                libsql::params![product_id, *tag_id],
            )
            .await
            .map_err(|_| ShopError::not_found("Tag", tag_id))?;
        }

        tx.commit().await.map_err(|e| db_err("commit product tags", e))?;
        Ok(())
    }

    async fn create_category(&self, category: &mut Category) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO categories (name, description) VALUES (?, ?)",
            libsql::params![category.name.clone(), category.description.clone()],
        )
        .await
        .map_err(|e| db_err("insert category", e))?;
        category.id = conn.last_insert_rowid();
        Ok(())
    }

    async fn get_categories_by_ids(&self, ids: &[i64]) -> Result<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT id, name, description FROM categories WHERE id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut rows = conn
            .query(&sql, int_params(ids))
            .await
            .map_err(|e| db_err("query categories", e))?;
        let mut categories = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            categories.push(category_from_row(&row)?);
        }
        Ok(categories)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query("SELECT id, name, description FROM categories ORDER BY id", ())
            .await
            .map_err(|e| db_err("list categories", e))?;
        let mut categories = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            categories.push(category_from_row(&row)?);
        }
        Ok(categories)
    }

    async fn create_tag(&self, tag: &mut Tag) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute("INSERT INTO tags (name) VALUES (?)", libsql::params![tag.name.clone()])
            .await
            .map_err(|e| db_err("insert tag", e))?;
        tag.id = conn.last_insert_rowid();
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query("SELECT id, name FROM tags ORDER BY id", ())
            .await
            .map_err(|e| db_err("list tags", e))?;
        let mut tags = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            tags.push(Tag {
                id: int(&row, 0)?,
                name: text(&row, 1)?,
            });
        }
        Ok(tags)
    }

    async fn get_tags_for_products(&self, product_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT pt.product_id, t.id, t.name FROM product_tags pt JOIN tags t ON t.id = pt.tag_id WHERE pt.product_id IN ({}) ORDER BY t.id",
            placeholders(product_ids.len())
        );
        let mut rows = conn
            .query(&sql, int_params(product_ids))
            .await
            .map_err(|e| db_err("query tags for products", e))?;

        let mut map: HashMap<i64, Vec<Tag>> =
            product_ids.iter().map(|id| (*id, Vec::new())).collect();
        while let Some(row) = next_row(&mut rows).await? {
            map.entry(int(&row, 0)?).or_default().push(Tag {
                id: int(&row, 1)?,
                name: text(&row, 2)?,
            });
        }
        Ok(map)
    }

    async fn create_user(&self, user: &mut User) -> Result<()> {
        let conn = self.conn().await?;
        user.created_at = Utc::now();
        conn.execute(
            "INSERT INTO users (username, email, created_at) VALUES (?, ?, ?)",
            libsql::params![user.username.clone(), user.email.clone(), ts(&user.created_at)],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                ShopError::Validation(format!("Username {} is already taken", user.username))
            } else {
                db_err("insert user", e)
            }
        })?;
        user.id = conn.last_insert_rowid();

        debug!("Created user: {} with id {}", user.username, user.id);
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.get_users_by_ids(&[id]).await?.into_iter().next())
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT id, username, email, created_at FROM users WHERE id IN ({}) ORDER BY id",
            placeholders(ids.len())
        );
        let mut rows = conn
            .query(&sql, int_params(ids))
            .await
            .map_err(|e| db_err("query users", e))?;
        let mut users = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            users.push(User {
                id: int(&row, 0)?,
                username: text(&row, 1)?,
                email: text(&row, 2)?,
                created_at: timestamp(&text(&row, 3)?)?,
            });
        }
        Ok(users)
    }

    async fn create_order(&self, new_order: NewOrder) -> Result<(Order, Vec<OrderProduct>)> {
        let conn = self.conn().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| db_err("begin transaction", e))?;

        let mut rows = tx
            .query("SELECT id FROM users WHERE id = ?", libsql::params![new_order.user_id])
            .await
            .map_err(|e| db_err("check user", e))?;
        if next_row(&mut rows).await?.is_none() {
            return Err(ShopError::not_found("User", new_order.user_id));
        }

        let now = Utc::now();
        let order = Order {
            uuid: Uuid::new_v4(),
            user_id: new_order.user_id,
            display_number: new_order.display_number,
            created_at: now,
            updated_at: now,
        };
        tx.execute(
            "INSERT INTO orders (uuid, user_id, display_number, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            libsql::params![
                order.uuid.to_string(),
                order.user_id,
                order.display_number,
                ts(&order.created_at),
                ts(&order.updated_at)
            ],
        )
        .await
        .map_err(|e| db_err("insert order", e))?;

        let mut items = Vec::with_capacity(new_order.items.len());
        for item in new_order.items {
            tx.execute(
                "INSERT INTO order_products (order_uuid, product_id, quantity, price) VALUES (?, ?, ?, ?)",
                libsql::params![
                    order.uuid.to_string(),
                    item.product_id,
                    i64::from(item.quantity),
                    item.price.to_string()
                ],
            )
            .await
            .map_err(|_| ShopError::not_found("Product", item.product_id))?;
            items.push(OrderProduct {
                id: tx.last_insert_rowid(),
                order_uuid: order.uuid,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            });
        }

        // Dropping `tx` on any early return above rolls the order back
        tx.commit().await.map_err(|e| db_err("commit order", e))?;

        debug!("Created order {} with {} items", order.uuid, items.len());
        Ok((order, items))
    }

    async fn get_order(&self, uuid: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE uuid = ?");
        let orders = self
            .query_orders(&sql, Params::Positional(vec![Value::Text(uuid.to_string())]))
            .await?;
        Ok(orders.into_iter().next())
    }

    async fn list_orders(&self, user_id: Option<i64>) -> Result<Vec<Order>> {
        match user_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at, uuid"
                );
                self.query_orders(&sql, Params::Positional(vec![Value::Integer(id)]))
                    .await
            }
            None => {
                let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at, uuid");
                self.query_orders(&sql, Params::None).await
            }
        }
    }

    async fn delete_order(&self, uuid: Uuid) -> Result<Option<Order>> {
        let Some(order) = self.get_order(uuid).await? else {
            return Ok(None);
        };
        let conn = self.conn().await?;
        conn.execute(
            "DELETE FROM orders WHERE uuid = ?",
            libsql::params![uuid.to_string()],
        )
        .await
        .map_err(|e| db_err("delete order", e))?;
        debug!("Deleted order {}", uuid);
        Ok(Some(order))
    }

    async fn get_order_products(&self, order_uuid: Uuid) -> Result<Vec<OrderProduct>> {
        let sql =
            format!("SELECT {ORDER_PRODUCT_COLUMNS} FROM order_products WHERE order_uuid = ? ORDER BY id");
        self.query_order_products(&sql, Params::Positional(vec![Value::Text(order_uuid.to_string())]))
            .await
    }

    async fn get_order_products_for_orders(
        &self,
        order_uuids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<OrderProduct>>> {
        if order_uuids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT {ORDER_PRODUCT_COLUMNS} FROM order_products WHERE order_uuid IN ({}) ORDER BY id",
            placeholders(order_uuids.len())
        );
        let items = self.query_order_products(&sql, uuid_params(order_uuids)).await?;
        let mut map: HashMap<Uuid, Vec<OrderProduct>> = HashMap::new();
        for item in items {
            map.entry(item.order_uuid).or_default().push(item);
        }
        Ok(map)
    }

    async fn orders_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE created_at >= ? AND created_at <= ? ORDER BY created_at"
        );
        self.query_orders(
            &sql,
            Params::Positional(vec![Value::Text(ts(&start)), Value::Text(ts(&end))]),
        )
        .await
    }

    async fn top_products(&self, order_uuids: &[Uuid], limit: usize) -> Result<Vec<ProductSales>> {
        let items: Vec<OrderProduct> = self
            .get_order_products_for_orders(order_uuids)
            .await?
            .into_values()
            .flatten()
            .collect();
        let mut product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let titles: HashMap<i64, String> = self
            .get_products_by_ids(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.title))
            .collect();
        Ok(rank_product_sales(&items, &titles, limit))
    }

    async fn create_store(&self, store: &mut Store) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO stores (name, country, city, address, square, employees_num, inventory, notes, opened_date, featured) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                store.name.clone(),
                store.country.clone(),
                store.city.clone(),
                store.address.clone(),
                store.square,
                i64::from(store.employees_num),
                i64::from(store.inventory),
                store.notes.clone(),
                store.opened_date.map(|d| d.to_string()),
                i64::from(store.featured)
            ],
        )
        .await
        .map_err(|e| db_err("insert store", e))?;
        store.id = conn.last_insert_rowid();
        Ok(())
    }

    async fn list_featured_stores(&self) -> Result<Vec<Store>> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores WHERE featured = 1 ORDER BY id");
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| db_err("list stores", e))?;
        let mut stores = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            let opened_date = opt_text(&row, 9)?
                .map(|s| NaiveDate::from_str(&s))
                .transpose()
                .map_err(|e| ShopError::database(format!("Invalid opened_date: {e}")))?;
            stores.push(Store {
                id: int(&row, 0)?,
                name: text(&row, 1)?,
                country: text(&row, 2)?,
                city: text(&row, 3)?,
                address: text(&row, 4)?,
                square: real(&row, 5)?,
                employees_num: int(&row, 6)? as i32,
                inventory: int(&row, 7)? as i32,
                notes: opt_text(&row, 8)?,
                opened_date,
                featured: int(&row, 10)? != 0,
            });
        }
        Ok(stores)
    }

    async fn record_task_result(&self, result: &TaskResult) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT OR REPLACE INTO task_results (id, task_name, status, result, error, attempts, enqueued_at, finished_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                result.id.to_string(),
                result.task_name.clone(),
                result.status.as_str(),
                result.result.clone(),
                result.error.clone(),
                i64::from(result.attempts),
                ts(&result.enqueued_at),
                ts(&result.finished_at)
            ],
        )
        .await
        .map_err(|e| db_err("insert task result", e))?;
        Ok(())
    }

    async fn list_task_results(&self, limit: usize) -> Result<Vec<TaskResult>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT id, task_name, status, result, error, attempts, enqueued_at, finished_at FROM task_results ORDER BY finished_at DESC LIMIT ?",
                libsql::params![limit as i64],
            )
            .await
            .map_err(|e| db_err("list task results", e))?;
        let mut results = Vec::new();
        while let Some(row) = next_row(&mut rows).await? {
            let status = text(&row, 2)?;
            results.push(TaskResult {
                id: parse_uuid(&text(&row, 0)?)?,
                task_name: text(&row, 1)?,
                status: TaskStatus::parse(&status)
                    .ok_or_else(|| ShopError::database(format!("Unknown task status {status}")))?,
                result: opt_text(&row, 3)?,
                error: opt_text(&row, 4)?,
                attempts: int(&row, 5)? as u32,
                enqueued_at: timestamp(&text(&row, 6)?)?,
                finished_at: timestamp(&text(&row, 7)?)?,
            });
        }
        Ok(results)
    }
}

fn db_err(action: &str, e: libsql::Error) -> ShopError {
    ShopError::database(format!("Failed to {action}: {e}"))
}

/// Fixed-width RFC 3339 so that text comparison matches time order
fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ShopError::database(format!("Invalid timestamp '{s}': {e}")))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| ShopError::database(format!("Invalid uuid '{s}': {e}")))
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| ShopError::database(format!("Invalid decimal '{s}': {e}")))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn int_params(ids: &[i64]) -> Params {
    Params::Positional(ids.iter().map(|id| Value::Integer(*id)).collect())
}

fn uuid_params(uuids: &[Uuid]) -> Params {
    Params::Positional(uuids.iter().map(|u| Value::Text(u.to_string())).collect())
}

async fn next_row(rows: &mut Rows) -> Result<Option<Row>> {
    rows.next().await.map_err(|e| db_err("read row", e))
}

fn value(row: &Row, idx: i32) -> Result<Value> {
    row.get_value(idx)
        .map_err(|e| ShopError::database(format!("Failed to read column {idx}: {e}")))
}

fn int(row: &Row, idx: i32) -> Result<i64> {
    match value(row, idx)? {
        Value::Integer(i) => Ok(i),
        other => Err(ShopError::database(format!(
            "Expected integer in column {idx}, got {other:?}"
        ))),
    }
}

fn opt_int(row: &Row, idx: i32) -> Result<Option<i64>> {
    match value(row, idx)? {
        Value::Null => Ok(None),
        Value::Integer(i) => Ok(Some(i)),
        other => Err(ShopError::database(format!(
            "Expected integer in column {idx}, got {other:?}"
        ))),
    }
}

fn real(row: &Row, idx: i32) -> Result<f64> {
    match value(row, idx)? {
        Value::Real(f) => Ok(f),
        Value::Integer(i) => Ok(i as f64),
        other => Err(ShopError::database(format!(
            "Expected real in column {idx}, got {other:?}"
        ))),
    }
}

fn text(row: &Row, idx: i32) -> Result<String> {
    opt_text(row, idx)?
        .ok_or_else(|| ShopError::database(format!("Unexpected NULL in column {idx}")))
}

fn opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match value(row, idx)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(ShopError::database(format!(
            "Expected text in column {idx}, got {other:?}"
        ))),
    }
}

fn product_from_row(row: &Row) -> Result<Product> {
    Ok(Product {
        id: int(row, 0)?,
        title: text(row, 1)?,
        description: opt_text(row, 2)?,
        price: parse_decimal(&text(row, 3)?)?,
        summary: text(row, 4)?,
        is_18_plus: int(row, 5)? != 0,
        category_id: opt_int(row, 6)?,
        tag_ids: Vec::new(),
        created_at: timestamp(&text(row, 7)?)?,
    })
}

fn category_from_row(row: &Row) -> Result<Category> {
    Ok(Category {
        id: int(row, 0)?,
        name: text(row, 1)?,
        description: opt_text(row, 2)?,
    })
}

fn order_from_row(row: &Row) -> Result<Order> {
    Ok(Order {
        uuid: parse_uuid(&text(row, 0)?)?,
        user_id: int(row, 1)?,
        display_number: real(row, 2)?,
        created_at: timestamp(&text(row, 3)?)?,
        updated_at: timestamp(&text(row, 4)?)?,
    })
}

fn order_product_from_row(row: &Row) -> Result<OrderProduct> {
    Ok(OrderProduct {
        id: int(row, 0)?,
        order_uuid: parse_uuid(&text(row, 1)?)?,
        product_id: int(row, 2)?,
        quantity: int(row, 3)? as i32,
        price: parse_decimal(&text(row, 4)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use tempfile::TempDir;

    async fn open() -> (TempDir, DatabaseStorage) {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: dir.path().join("shop.db").to_string_lossy().into_owned(),
            auth_token: None,
        };
        let manager = DatabaseManager::new(&config).await.unwrap();
        manager.run_migrations().await.unwrap();
        (dir, DatabaseStorage::new(manager).await.unwrap())
    }

    async fn seed(storage: &DatabaseStorage, title: &str) -> Product {
        let mut product = Product {
            id: 0,
            title: title.to_string(),
            description: None,
            price: Decimal::new(250, 2),
            summary: String::new(),
            is_18_plus: false,
            category_id: None,
            tag_ids: vec![],
            created_at: Utc::now(),
        };
        storage.create_product(&mut product).await.unwrap();
        product
    }

    async fn user(storage: &DatabaseStorage, name: &str) -> User {
        let mut user = User {
            id: 0,
            username: name.to_string(),
            email: format!("{name}@example.com"),
            created_at: Utc::now(),
        };
        storage.create_user(&mut user).await.unwrap();
        user
    }

    fn new_order(user_id: i64, items: &[(i64, i32)]) -> NewOrder {
        NewOrder {
            user_id,
            display_number: 1.5,
            items: items
                .iter()
                .map(|&(product_id, quantity)| NewOrderItem {
                    product_id,
                    quantity,
                    price: Decimal::new(250, 2),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_order_with_unknown_product_is_rolled_back() {
        let (_dir, storage) = open().await;
        let ann = user(&storage, "ann").await;
        let tea = seed(&storage, "Tea").await;

        let err = storage
            .create_order(new_order(ann.id, &[(tea.id, 1), (999, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::NotFound { entity: "Product", .. }));
        assert!(storage.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_referenced_product_is_protected_until_order_deleted() {
        let (_dir, storage) = open().await;
        let ann = user(&storage, "ann").await;
        let tea = seed(&storage, "Tea").await;
        let (order, items) = storage
            .create_order(new_order(ann.id, &[(tea.id, 2)]))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(storage.get_order_products(order.uuid).await.unwrap(), items);

        let err = storage.delete_product(tea.id).await.unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));

        let deleted = storage.delete_order(order.uuid).await.unwrap();
        assert_eq!(deleted.map(|o| o.uuid), Some(order.uuid));
        assert!(storage.get_order_products(order.uuid).await.unwrap().is_empty());
        assert!(storage.delete_product(tea.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_orders_window_is_inclusive_and_top_products_ranked() {
        let (_dir, storage) = open().await;
        let ann = user(&storage, "ann").await;
        let tea = seed(&storage, "Tea").await;
        let cake = seed(&storage, "Cake").await;
        let (first, _) = storage
            .create_order(new_order(ann.id, &[(tea.id, 1), (cake.id, 1)]))
            .await
            .unwrap();
        let (second, _) = storage
            .create_order(new_order(ann.id, &[(tea.id, 1)]))
            .await
            .unwrap();

        let exact = storage
            .orders_created_between(first.created_at, first.created_at)
            .await
            .unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].uuid, first.uuid);

        let before = first.created_at - chrono::Duration::milliseconds(1);
        assert!(storage
            .orders_created_between(before - chrono::Duration::seconds(1), before)
            .await
            .unwrap()
            .is_empty());

        let top = storage.top_products(&[first.uuid, second.uuid], 3).await.unwrap();
        let ranked: Vec<(String, i64)> = top.into_iter().map(|s| (s.title, s.total_quantity)).collect();
        assert_eq!(ranked, vec![("Tea".to_string(), 2), ("Cake".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_usernames_are_unique_ignoring_case() {
        let (_dir, storage) = open().await;
        user(&storage, "Ann").await;

        let mut duplicate = User {
            id: 0,
            username: "ann".to_string(),
            email: "other@example.com".to_string(),
            created_at: Utc::now(),
        };
        let err = storage.create_user(&mut duplicate).await.unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
    }
}
