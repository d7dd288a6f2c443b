use crate::app::{CatalogUseCase, OrderUseCase, UserUseCase};
use crate::graphql::loaders::{
    CategoryLoader, OrderProductsLoader, ProductLoader, TagsLoader, UserLoader,
};
use crate::graphql::resolvers::{Mutation, Query};
use crate::signals::SignalBus;
use crate::storage::Storage;
use async_graphql::{EmptySubscription, Schema};
use std::sync::Arc;

/// GraphQL context containing shared application state
#[derive(Clone)]
pub struct GraphQLContext {
    pub storage: Arc<dyn Storage>,
    pub catalog: Arc<CatalogUseCase>,
    pub orders: Arc<OrderUseCase>,
    pub users: Arc<UserUseCase>,
}

impl GraphQLContext {
    /// Build the use cases over `storage`, emitting lifecycle signals on `signals`
    pub fn new(storage: Arc<dyn Storage>, signals: SignalBus) -> Self {
        Self {
            catalog: Arc::new(CatalogUseCase::new(storage.clone(), signals.clone())),
            orders: Arc::new(OrderUseCase::new(storage.clone(), signals.clone())),
            users: Arc::new(UserUseCase::new(storage.clone(), signals)),
            storage,
        }
    }
}

/// The complete GraphQL schema
pub type ShopSchema = Schema<Query, Mutation, EmptySubscription>;

/// Create the schema with the context and one DataLoader per batched relation
pub fn create_schema(context: GraphQLContext) -> ShopSchema {
    let storage = context.storage.clone();
    Schema::build(Query, Mutation, EmptySubscription)
        .data(CategoryLoader::new(storage.clone()))
        .data(TagsLoader::new(storage.clone()))
        .data(ProductLoader::new(storage.clone()))
        .data(UserLoader::new(storage.clone()))
        .data(OrderProductsLoader::new(storage))
        .data(context)
        .finish()
}
