use crate::app::{ProductChanges, ProductInput};
use crate::graphql::parse_id;
use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{
    Category, CreateOrderInput, CreateOrderPayload, Order, ProductPayload, Tag, User,
};
use async_graphql::{Context, FieldResult, Object, ID};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Root mutation object for GraphQL
pub struct Mutation;

#[Object]
impl Mutation {
    #[allow(clippy::too_many_arguments)]
    async fn create_product(
        &self,
        ctx: &Context<'_>,
        title: String,
        price: Decimal,
        summary: String,
        #[graphql(name = "is18Plus")] is_18_plus: bool,
        description: Option<String>,
        category_id: Option<ID>,
    ) -> FieldResult<ProductPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let category_id = category_id.as_ref().map(parse_id).transpose()?;

        let result = context
            .catalog
            .create_product(ProductInput {
                title,
                description,
                price,
                summary,
                is_18_plus,
                category_id,
            })
            .await;
        Ok(result.into())
    }

    /// Omitted arguments leave the field unchanged
    #[allow(clippy::too_many_arguments)]
    async fn update_product(
        &self,
        ctx: &Context<'_>,
        id: ID,
        title: Option<String>,
        price: Option<Decimal>,
        summary: Option<String>,
        #[graphql(name = "is18Plus")] is_18_plus: Option<bool>,
        description: Option<String>,
        category_id: Option<ID>,
    ) -> FieldResult<ProductPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let changes = ProductChanges {
            title,
            description,
            price,
            summary,
            is_18_plus,
            category_id: category_id.as_ref().map(parse_id).transpose()?,
        };
        Ok(context.catalog.update_product(parse_id(&id)?, changes).await.into())
    }

    /// False when the product does not exist
    async fn delete_product(&self, ctx: &Context<'_>, id: ID) -> FieldResult<bool> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.catalog.delete_product(parse_id(&id)?).await?)
    }

    async fn set_product_tags(
        &self,
        ctx: &Context<'_>,
        product_id: ID,
        tag_ids: Vec<ID>,
    ) -> FieldResult<ProductPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let tag_ids = tag_ids.iter().map(parse_id).collect::<FieldResult<Vec<i64>>>()?;
        Ok(context
            .catalog
            .set_product_tags(parse_id(&product_id)?, &tag_ids)
            .await
            .into())
    }

    async fn create_category(
        &self,
        ctx: &Context<'_>,
        name: String,
        description: Option<String>,
    ) -> FieldResult<Category> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.catalog.create_category(&name, description).await?.into())
    }

    async fn create_tag(&self, ctx: &Context<'_>, name: String) -> FieldResult<Tag> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.catalog.create_tag(&name).await?.into())
    }

    async fn create_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        email: String,
    ) -> FieldResult<User> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.users.create_user(&username, &email).await?.into())
    }

    /// Place an order with one unit of each listed product
    async fn create_order(
        &self,
        ctx: &Context<'_>,
        input_data: CreateOrderInput,
    ) -> FieldResult<CreateOrderPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let user_id = parse_id(&input_data.user_id)?;
        let product_ids = input_data
            .product_ids
            .iter()
            .map(parse_id)
            .collect::<FieldResult<Vec<i64>>>()?;

        let (order, _) = context.orders.create_order(user_id, &product_ids).await?;
        Ok(CreateOrderPayload {
            order: Some(Order::from(order)),
        })
    }

    /// False when the order does not exist
    async fn delete_order(&self, ctx: &Context<'_>, uuid: Uuid) -> FieldResult<bool> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.orders.delete_order(uuid).await?)
    }
}
