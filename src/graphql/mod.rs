pub mod loaders;
pub mod resolvers;
pub mod schema;
pub mod types;

pub use schema::{create_schema, GraphQLContext, ShopSchema};

use async_graphql::ID;

/// Parse a numeric GraphQL ID
pub(crate) fn parse_id(id: &ID) -> async_graphql::Result<i64> {
    id.parse::<i64>()
        .map_err(|_| async_graphql::Error::new(format!("Invalid ID: {}", id.as_str())))
}
