use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub summary: String,
    pub is_18_plus: bool,
    pub category_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub uuid: Uuid,
    pub user_id: i64,
    pub display_number: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderProduct {
    pub id: i64,
    pub order_uuid: Uuid,
    pub product_id: i64,
    pub quantity: i32,
    /// Unit price captured when the order was placed
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: i64,
    pub display_number: f64,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub city: String,
    pub address: String,
    pub square: f64,
    pub employees_num: i32,
    pub inventory: i32,
    pub notes: Option<String>,
    pub opened_date: Option<NaiveDate>,
    pub featured: bool,
}

/// Aggregated units sold for one product over a set of orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSales {
    pub product_id: i64,
    pub title: String,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Success,
    Failure,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Skipped => "SKIPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(TaskStatus::Success),
            "FAILURE" => Some(TaskStatus::Failure),
            "SKIPPED" => Some(TaskStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one background task, kept for inspection after the fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: Uuid,
    pub task_name: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
