pub mod in_memory;
pub mod traits;

#[cfg(feature = "db")]
pub mod database;

pub use in_memory::InMemoryStorage;
pub use traits::Storage;

#[cfg(feature = "db")]
pub use database::DatabaseStorage;

use crate::domain::{OrderProduct, ProductSales};
use std::collections::HashMap;

/// Sum quantities per product and rank them best seller first, ties broken by title.
pub(crate) fn rank_product_sales(
    items: &[OrderProduct],
    titles: &HashMap<i64, String>,
    limit: usize,
) -> Vec<ProductSales> {
    let mut totals: HashMap<i64, i64> = HashMap::new();
    for item in items {
        *totals.entry(item.product_id).or_insert(0) += i64::from(item.quantity);
    }

    let mut ranked: Vec<ProductSales> = totals
        .into_iter()
        .map(|(product_id, total_quantity)| ProductSales {
            product_id,
            title: titles.get(&product_id).cloned().unwrap_or_default(),
            total_quantity,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.title.cmp(&b.title))
    });
    ranked.truncate(limit);
    ranked
}
