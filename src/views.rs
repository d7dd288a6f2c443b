//! Plain HTTP views next to the GraphQL endpoint.

use crate::app::CatalogUseCase;
use crate::constants;
use crate::domain::{Product, Store};
use crate::error::ShopError;
use crate::storage::Storage;
use crate::tasks::{Job, TaskQueue};
use askama::Template;
use axum::{
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Shared state for the views
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub catalog: Arc<CatalogUseCase>,
    pub queue: TaskQueue,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    fn resolve(&self) -> (i64, i64) {
        (
            self.offset.unwrap_or(constants::DEFAULT_PAGE_OFFSET),
            self.limit.unwrap_or(constants::DEFAULT_PAGE_LIMIT),
        )
    }
}

/// Maps storage and validation failures onto HTTP statuses
pub struct ViewError(ShopError);

impl From<ShopError> for ViewError {
    fn from(e: ShopError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        match self.0 {
            ShopError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            e @ ShopError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
            other => {
                error!("View failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

pub struct ProductRow {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub summary: String,
    pub is_18_plus: bool,
}

impl From<Product> for ProductRow {
    fn from(p: Product) -> Self {
        Self {
            title: p.title,
            description: p.description.unwrap_or_default(),
            price: p.price,
            summary: p.summary,
            is_18_plus: p.is_18_plus,
        }
    }
}

#[derive(Template)]
#[template(path = "products.html")]
pub struct ProductsTemplate {
    pub products: Vec<ProductRow>,
    pub total_count: i64,
    pub limit: i64,
    pub has_prev: bool,
    pub prev_offset: i64,
    pub has_next: bool,
    pub next_offset: i64,
}

/// HTML product listing, `?offset=&limit=` defaulting to 0 and 10
pub async fn products_page(
    Extension(state): Extension<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Html<String>, ViewError> {
    let (offset, limit) = params.resolve();
    let page = state.catalog.list_products(Some(offset), Some(limit)).await?;

    let next_offset = offset.saturating_add(limit);
    let template = ProductsTemplate {
        has_prev: offset > 0,
        prev_offset: offset.saturating_sub(limit).max(0),
        has_next: next_offset < page.total_count,
        next_offset,
        total_count: page.total_count,
        limit,
        products: page.nodes.into_iter().map(ProductRow::from).collect(),
    };
    let html = template
        .render()
        .map_err(|e| ShopError::Task(format!("Template rendering failed: {e}")))?;
    Ok(Html(html))
}

#[derive(Debug, Serialize)]
pub struct ProductJson {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub summary: String,
    pub is_18_plus: bool,
}

/// JSON product listing with the same paging as the HTML page
pub async fn products_json(
    Extension(state): Extension<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ViewError> {
    let (offset, limit) = params.resolve();
    let page = state.catalog.list_products(Some(offset), Some(limit)).await?;
    let data: Vec<ProductJson> = page
        .nodes
        .into_iter()
        .map(|p| ProductJson {
            title: p.title,
            description: p.description,
            price: p.price,
            summary: p.summary,
            is_18_plus: p.is_18_plus,
        })
        .collect();
    Ok(Json(json!({ "data": data })))
}

/// Featured stores only
pub async fn stores(Extension(state): Extension<AppState>) -> Result<impl IntoResponse, ViewError> {
    let stores: Vec<Store> = state.storage.list_featured_stores().await?;
    Ok(Json(json!({ "data": stores })))
}

/// Enqueue the hello-world task
pub async fn hello_world_task(Extension(state): Extension<AppState>) -> Response {
    match state.queue.enqueue(Job::HelloWorld) {
        Ok(_) => "OK".into_response(),
        Err(e) => {
            error!("Failed to enqueue hello world task: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}
