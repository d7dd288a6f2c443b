use crate::domain::{Order as DomainOrder, OrderProduct as DomainOrderProduct};
use crate::graphql::loaders::{OrderProductsLoader, ProductLoader, UserLoader};
use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{Product, User};
use async_graphql::dataloader::DataLoader;
use async_graphql::{Context, FieldResult, InputObject, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// GraphQL representation of an Order
#[derive(Clone)]
pub struct Order {
    pub inner: DomainOrder,
}

impl From<DomainOrder> for Order {
    fn from(order: DomainOrder) -> Self {
        Self { inner: order }
    }
}

#[Object]
impl Order {
    async fn uuid(&self) -> Uuid {
        self.inner.uuid
    }

    async fn user(&self, ctx: &Context<'_>) -> FieldResult<Option<User>> {
        let loader = ctx.data::<DataLoader<UserLoader>>()?;
        Ok(loader.load_one(self.inner.user_id).await?.map(User::from))
    }

    /// One entry per line item, so a product ordered twice appears twice
    async fn products(&self, ctx: &Context<'_>) -> FieldResult<Vec<Product>> {
        let items = ctx
            .data::<DataLoader<OrderProductsLoader>>()?
            .load_one(self.inner.uuid)
            .await?
            .unwrap_or_default();
        let ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        let products = ctx
            .data::<DataLoader<ProductLoader>>()?
            .load_many(ids.iter().copied())
            .await?;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).cloned())
            .map(Product::from)
            .collect())
    }

    async fn order_products(&self, ctx: &Context<'_>) -> FieldResult<Vec<OrderProduct>> {
        let items = ctx
            .data::<DataLoader<OrderProductsLoader>>()?
            .load_one(self.inner.uuid)
            .await?
            .unwrap_or_default();
        Ok(items.into_iter().map(OrderProduct::from).collect())
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }

    async fn display_number(&self) -> f64 {
        self.inner.display_number
    }
}

/// A product line within an order
#[derive(Clone)]
pub struct OrderProduct {
    pub inner: DomainOrderProduct,
}

impl From<DomainOrderProduct> for OrderProduct {
    fn from(item: DomainOrderProduct) -> Self {
        Self { inner: item }
    }
}

#[Object]
impl OrderProduct {
    async fn order(&self, ctx: &Context<'_>) -> FieldResult<Option<Order>> {
        let context = ctx.data::<GraphQLContext>()?;
        let order = context.storage.get_order(self.inner.order_uuid).await?;
        Ok(order.map(Order::from))
    }

    async fn product(&self, ctx: &Context<'_>) -> FieldResult<Option<Product>> {
        let loader = ctx.data::<DataLoader<ProductLoader>>()?;
        Ok(loader.load_one(self.inner.product_id).await?.map(Product::from))
    }

    async fn quantity(&self) -> i32 {
        self.inner.quantity
    }

    /// Unit price when the order was placed
    async fn price(&self) -> Decimal {
        self.inner.price
    }
}

#[derive(InputObject)]
pub struct CreateOrderInput {
    pub user_id: ID,
    pub product_ids: Vec<ID>,
}

#[derive(SimpleObject)]
pub struct CreateOrderPayload {
    pub order: Option<Order>,
}
