use crate::graphql::parse_id;
use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{Category, Order, PaginatedProducts, Product, Tag, TaskResult};
use async_graphql::{Context, FieldResult, Object, ID};

const DEFAULT_TASK_RESULTS: i32 = 50;

/// Root query object for GraphQL
pub struct Query;

#[Object]
impl Query {
    /// Products ordered by id; without `limit` everything after `offset` is returned
    async fn products(
        &self,
        ctx: &Context<'_>,
        offset: Option<i32>,
        limit: Option<i32>,
    ) -> FieldResult<PaginatedProducts> {
        let context = ctx.data::<GraphQLContext>()?;
        let page = context
            .catalog
            .list_products(offset.map(i64::from), limit.map(i64::from))
            .await?;

        Ok(PaginatedProducts {
            nodes: page.nodes.into_iter().map(Product::from).collect(),
            total_count: page.total_count,
        })
    }

    async fn product(&self, ctx: &Context<'_>, id: ID) -> FieldResult<Option<Product>> {
        let context = ctx.data::<GraphQLContext>()?;
        let product = context.catalog.get_product(parse_id(&id)?).await?;
        Ok(product.map(Product::from))
    }

    /// All orders, or only those placed by `user_id`
    async fn orders(&self, ctx: &Context<'_>, user_id: Option<i32>) -> FieldResult<Vec<Order>> {
        let context = ctx.data::<GraphQLContext>()?;
        let orders = context.orders.list_orders(user_id.map(i64::from)).await?;
        Ok(orders.into_iter().map(Order::from).collect())
    }

    async fn categories(&self, ctx: &Context<'_>) -> FieldResult<Vec<Category>> {
        let context = ctx.data::<GraphQLContext>()?;
        let categories = context.catalog.list_categories().await?;
        Ok(categories.into_iter().map(Category::from).collect())
    }

    async fn tags(&self, ctx: &Context<'_>) -> FieldResult<Vec<Tag>> {
        let context = ctx.data::<GraphQLContext>()?;
        let tags = context.catalog.list_tags().await?;
        Ok(tags.into_iter().map(Tag::from).collect())
    }

    /// Most recent background task outcomes first
    async fn task_results(
        &self,
        ctx: &Context<'_>,
        limit: Option<i32>,
    ) -> FieldResult<Vec<TaskResult>> {
        let context = ctx.data::<GraphQLContext>()?;
        let limit = limit.unwrap_or(DEFAULT_TASK_RESULTS).max(0) as usize;
        let results = context.storage.list_task_results(limit).await?;
        Ok(results.into_iter().map(TaskResult::from).collect())
    }
}
