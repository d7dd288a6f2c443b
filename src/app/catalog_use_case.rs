use crate::constants;
use crate::domain::{Category, Product, Tag};
use crate::error::{Result, ShopError};
use crate::signals::{Signal, SignalBus};
use crate::storage::Storage;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

pub const PRICE_MUST_BE_POSITIVE: &str = "Price must be greater than 0";
pub const PRODUCT_NOT_FOUND: &str = "Product not found";

#[derive(Debug, Clone)]
pub struct ProductInput {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub summary: String,
    pub is_18_plus: bool,
    pub category_id: Option<i64>,
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub summary: Option<String>,
    pub is_18_plus: Option<bool>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ProductPage {
    pub nodes: Vec<Product>,
    pub total_count: i64,
}

/// Use case for products, categories and tags
pub struct CatalogUseCase {
    storage: Arc<dyn Storage>,
    signals: SignalBus,
}

impl CatalogUseCase {
    pub fn new(storage: Arc<dyn Storage>, signals: SignalBus) -> Self {
        Self { storage, signals }
    }

    /// Products by id; no limit means everything after `offset`
    pub async fn list_products(&self, offset: Option<i64>, limit: Option<i64>) -> Result<ProductPage> {
        let offset = non_negative("offset", offset.unwrap_or(0))?;
        let limit = limit.map(|l| non_negative("limit", l)).transpose()?;

        let total_count = self.storage.count_products().await?;
        let nodes = self.storage.list_products(offset, limit).await?;
        Ok(ProductPage { nodes, total_count })
    }

    pub async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        self.storage.get_product(id).await
    }

    pub async fn create_product(&self, input: ProductInput) -> Result<Product> {
        validate_price(input.price)?;
        let mut product = Product {
            id: 0,
            title: input.title,
            description: input.description,
            price: input.price,
            summary: input.summary,
            is_18_plus: input.is_18_plus,
            category_id: input.category_id,
            tag_ids: Vec::new(),
            created_at: Utc::now(),
        };
        self.storage.create_product(&mut product).await?;
        info!(product_id = product.id, title = %product.title, "Product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: i64, changes: ProductChanges) -> Result<Product> {
        let mut product = self
            .storage
            .get_product(id)
            .await?
            .ok_or_else(|| ShopError::Validation(PRODUCT_NOT_FOUND.to_string()))?;

        if let Some(price) = changes.price {
            validate_price(price)?;
            product.price = price;
        }
        if let Some(title) = changes.title {
            product.title = title;
        }
        if let Some(description) = changes.description {
            product.description = Some(description);
        }
        if let Some(summary) = changes.summary {
            product.summary = summary;
        }
        if let Some(is_18_plus) = changes.is_18_plus {
            product.is_18_plus = is_18_plus;
        }
        if let Some(category_id) = changes.category_id {
            product.category_id = Some(category_id);
        }

        self.storage.update_product(&product).await?;
        Ok(product)
    }

    pub async fn delete_product(&self, id: i64) -> Result<bool> {
        let deleted = self.storage.delete_product(id).await?;
        if deleted {
            info!(product_id = id, "Product deleted");
        }
        Ok(deleted)
    }

    /// Replace the product's tags and return the updated product
    pub async fn set_product_tags(&self, product_id: i64, tag_ids: &[i64]) -> Result<Product> {
        self.storage.set_product_tags(product_id, tag_ids).await?;
        let product = self
            .storage
            .get_product(product_id)
            .await?
            .ok_or_else(|| ShopError::Validation(PRODUCT_NOT_FOUND.to_string()))?;

        self.signals.emit(Signal::ProductTagsChanged {
            product_id,
            tag_ids: product.tag_ids.clone(),
        });
        Ok(product)
    }

    pub async fn create_category(&self, name: &str, description: Option<String>) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShopError::Validation("Category name must not be blank".to_string()));
        }
        if name.chars().count() > constants::CATEGORY_NAME_MAX_LEN {
            return Err(ShopError::Validation(format!(
                "Category name must be at most {} characters",
                constants::CATEGORY_NAME_MAX_LEN
            )));
        }
        let mut category = Category {
            id: 0,
            name: name.to_string(),
            description,
        };
        self.storage.create_category(&mut category).await?;
        Ok(category)
    }

    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShopError::Validation("Tag name must not be blank".to_string()));
        }
        let mut tag = Tag {
            id: 0,
            name: name.to_string(),
        };
        self.storage.create_tag(&mut tag).await?;
        Ok(tag)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.storage.list_categories().await
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.storage.list_tags().await
    }
}

fn validate_price(price: Decimal) -> Result<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ShopError::Validation(PRICE_MUST_BE_POSITIVE.to_string()));
    }
    Ok(())
}

fn non_negative(name: &str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| ShopError::Validation(format!("{name} must not be negative")))
}
