use crate::domain::Product as DomainProduct;
use crate::error::ShopError;
use crate::graphql::loaders::{CategoryLoader, TagsLoader};
use crate::graphql::types::{Category, Tag};
use async_graphql::dataloader::DataLoader;
use async_graphql::{Context, FieldResult, Object, SimpleObject, ID};
use rust_decimal::Decimal;

/// GraphQL representation of a Product
#[derive(Clone)]
pub struct Product {
    pub inner: DomainProduct,
}

impl From<DomainProduct> for Product {
    fn from(product: DomainProduct) -> Self {
        Self { inner: product }
    }
}

#[Object]
impl Product {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.inner.title
    }

    async fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    async fn price(&self) -> Decimal {
        self.inner.price
    }

    async fn summary(&self) -> &str {
        &self.inner.summary
    }

    /// Whether buyers must be adults
    #[graphql(name = "is18Plus")]
    async fn is_18_plus(&self) -> bool {
        self.inner.is_18_plus
    }

    async fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.created_at
    }

    /// The product's category, batched across the whole response
    async fn category(&self, ctx: &Context<'_>) -> FieldResult<Option<Category>> {
        let Some(category_id) = self.inner.category_id else {
            return Ok(None);
        };
        let loader = ctx.data::<DataLoader<CategoryLoader>>()?;
        Ok(loader.load_one(category_id).await?.map(Category::from))
    }

    async fn tags(&self, ctx: &Context<'_>) -> FieldResult<Vec<Tag>> {
        let loader = ctx.data::<DataLoader<TagsLoader>>()?;
        let tags = loader.load_one(self.inner.id).await?.unwrap_or_default();
        Ok(tags.into_iter().map(Tag::from).collect())
    }
}

#[derive(SimpleObject)]
pub struct PaginatedProducts {
    pub nodes: Vec<Product>,
    pub total_count: i64,
}

/// Result of a product mutation.
///
/// Invalid input lands in `user_errors`; any other failure in `error`.
#[derive(SimpleObject, Default)]
pub struct ProductPayload {
    pub product: Option<Product>,
    pub user_errors: Vec<String>,
    pub error: Option<String>,
}

impl From<crate::error::Result<DomainProduct>> for ProductPayload {
    fn from(result: crate::error::Result<DomainProduct>) -> Self {
        match result {
            Ok(product) => Self {
                product: Some(product.into()),
                ..Default::default()
            },
            Err(e @ (ShopError::Validation(_) | ShopError::NotFound { .. })) => Self {
                user_errors: vec![e.to_string()],
                ..Default::default()
            },
            Err(e) => Self {
                error: Some(e.to_string()),
                ..Default::default()
            },
        }
    }
}
