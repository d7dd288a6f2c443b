//! Text and row builders for the notifications and reports sent by background jobs.

use crate::app::ports::OutgoingEmail;
use crate::constants;
use crate::domain::{Order, Product, ProductSales, User};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::fmt::Write;
use uuid::Uuid;

/// One line of an order as it appears in the chat message
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
}

pub fn order_created_message(order: &Order, lines: &[OrderLine], sent_at: DateTime<Utc>) -> String {
    let mut text = format!(
        "New order {} created at {}\n",
        order.uuid,
        sent_at.format("%Y-%m-%d %H:%M:%S%.6f%:z")
    );
    for line in lines {
        let _ = writeln!(text, "{} - {} - {}", line.title, line.quantity, line.price);
    }
    text
}

pub fn order_deleted_message(order_uuid: Uuid) -> String {
    format!("Order {order_uuid} deleted")
}

/// The whole calendar day before `now`, UTC, as an inclusive range
pub fn previous_day_window(now: DateTime<Utc>) -> (NaiveDate, DateTime<Utc>, DateTime<Utc>) {
    let day = (now - Duration::days(1)).date_naive();
    let start = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));
    let end = start + Duration::days(1) - Duration::nanoseconds(1);
    (day, start, end)
}

pub fn daily_statistics_message(day: NaiveDate, order_count: usize, top: &[ProductSales]) -> String {
    let mut text = format!("Number of orders created on {day}: {order_count}\n");
    for (rank, sales) in top.iter().take(constants::DAILY_TOP_PRODUCTS).enumerate() {
        let _ = writeln!(text, "{}. {} - {}", rank + 1, sales.title, sales.total_quantity);
    }
    text
}

/// `[title, price, description]` per product, price as a plain number
pub fn product_report_rows(products: &[Product]) -> Vec<Vec<Value>> {
    products
        .iter()
        .map(|p| {
            vec![
                json!(p.title),
                json!(p.price.to_f64().unwrap_or_default()),
                json!(p.description.clone().unwrap_or_default()),
            ]
        })
        .collect()
}

pub fn welcome_email(user: &User) -> OutgoingEmail {
    let greeting = format!("Hello, {}! Welcome to our service!", user.username);
    OutgoingEmail {
        to: user.email.clone(),
        subject: constants::WELCOME_EMAIL_SUBJECT.to_string(),
        html_body: Some(format!(
            "<h1>Hello, {}!</h1><p>Welcome to our service!</p>",
            html_escape(&user.username)
        )),
        text_body: greeting,
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
