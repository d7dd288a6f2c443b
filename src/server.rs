use crate::graphql::{create_schema, GraphQLContext, ShopSchema};
use crate::signals::{NotificationReceiver, SignalBus};
use crate::storage::Storage;
use crate::tasks::TaskQueue;
use crate::views::{self, AppState};
use axum::{
    http::Method,
    response::{Html, IntoResponse, Json},
    routing::get,
    Extension, Router,
};
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use hyper::Server;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "shop-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GraphQL handler (supports GET and POST)
async fn graphql_handler(
    Extension(schema): Extension<ShopSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// Create the HTTP router with the GraphQL endpoint and the plain views
pub fn create_router(schema: ShopSchema, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/graphql", get(graphql_handler).post(graphql_handler))
        .route("/graphiql", get(graphiql))
        .route("/products", get(views::products_page))
        .route("/api/products", get(views::products_json))
        .route("/stores", get(views::stores))
        .route(
            "/tasks/hello-world",
            get(views::hello_world_task).post(views::hello_world_task),
        )
        .layer(Extension(schema))
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Wire signals, use cases, schema and views over one storage and task queue.
///
/// `order_delay` is the countdown before an order's chat notification runs.
pub fn build_app(
    storage: Arc<dyn Storage>,
    queue: TaskQueue,
    order_delay: Duration,
) -> (ShopSchema, Router) {
    let signals = SignalBus::new().with_receiver(Arc::new(NotificationReceiver::new(
        queue.clone(),
        order_delay,
    )));
    let context = GraphQLContext::new(storage.clone(), signals);
    let state = AppState {
        storage,
        catalog: context.catalog.clone(),
        queue,
    };
    let schema = create_schema(context);
    let router = create_router(schema.clone(), state);
    (schema, router)
}

/// Serve `router` on `port` until `shutdown` resolves
pub async fn start_server<F>(router: Router, port: u16, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Health check: http://localhost:{port}/health");
    info!("GraphQL:      http://localhost:{port}/graphql");
    info!("GraphiQL UI:  http://localhost:{port}/graphiql");

    Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
