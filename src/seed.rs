//! Demo data for local development.

use crate::domain::{Category, Product, Store, Tag, User};
use crate::error::Result;
use crate::storage::Storage;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub tags: usize,
    pub products: usize,
    pub users: usize,
    pub stores: usize,
}

/// Insert a small catalog, one user and a few stores.
///
/// Writes straight to storage, so no signals fire and no emails go out.
pub async fn seed_demo_data(storage: &dyn Storage) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    let mut drinks = Category {
        id: 0,
        name: "Drinks".to_string(),
        description: Some("Hot and cold beverages".to_string()),
    };
    storage.create_category(&mut drinks).await?;
    let mut bakery = Category {
        id: 0,
        name: "Bakery".to_string(),
        description: None,
    };
    storage.create_category(&mut bakery).await?;
    summary.categories = 2;

    let mut tag_ids = Vec::new();
    for name in ["organic", "bestseller", "seasonal"] {
        let mut tag = Tag {
            id: 0,
            name: name.to_string(),
        };
        storage.create_tag(&mut tag).await?;
        tag_ids.push(tag.id);
    }
    summary.tags = tag_ids.len();

    let catalog = [
        ("Green tea", "Loose leaf sencha", 450, drinks.id, false),
        ("Espresso beans", "Dark roast, 250g", 1290, drinks.id, false),
        ("Craft IPA", "Six pack", 1599, drinks.id, true),
        ("Sourdough loaf", "Baked daily", 600, bakery.id, false),
        ("Croissant", "Butter croissant", 275, bakery.id, false),
    ];
    for (i, (title, summary_text, cents, category_id, adult)) in catalog.into_iter().enumerate() {
        let mut product = Product {
            id: 0,
            title: title.to_string(),
            description: Some(format!("{title}, from the demo catalog")),
            price: Decimal::new(cents, 2),
            summary: summary_text.to_string(),
            is_18_plus: adult,
            category_id: Some(category_id),
            tag_ids: Vec::new(),
            created_at: Utc::now(),
        };
        storage.create_product(&mut product).await?;
        storage
            .set_product_tags(product.id, &[tag_ids[i % tag_ids.len()]])
            .await?;
        summary.products += 1;
    }

    let mut user = User {
        id: 0,
        username: "demo".to_string(),
        email: "demo@example.com".to_string(),
        created_at: Utc::now(),
    };
    storage.create_user(&mut user).await?;
    summary.users = 1;

    let stores = [
        ("Downtown", "Seattle", "1st Ave 100", true),
        ("Harbor", "Tacoma", "Dock St 12", true),
        ("Outlet", "Everett", "Mall Way 5", false),
    ];
    for (name, city, address, featured) in stores {
        let mut store = Store {
            id: 0,
            name: name.to_string(),
            country: "US".to_string(),
            city: city.to_string(),
            address: address.to_string(),
            square: 120.5,
            employees_num: 6,
            inventory: 400,
            notes: None,
            opened_date: NaiveDate::from_ymd_opt(2021, 3, 15),
            featured,
        };
        storage.create_store(&mut store).await?;
        summary.stores += 1;
    }

    info!(?summary, "Seeded demo data");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[tokio::test]
    async fn test_seed_populates_every_table() {
        let storage = InMemoryStorage::new();
        let summary = seed_demo_data(&storage).await.unwrap();

        assert_eq!(storage.count_products().await.unwrap(), summary.products as i64);
        assert_eq!(storage.list_featured_stores().await.unwrap().len(), 2);
        let tagged = storage.get_tags_for_products(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).await.unwrap();
        assert_eq!(tagged.values().map(Vec::len).sum::<usize>(), summary.products);
    }
}
