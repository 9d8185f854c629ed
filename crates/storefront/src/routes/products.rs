//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use threadline_core::Money;

use crate::error::{AppError, Result};
use crate::models::{Badge, Page, Pagination, Product, ProductFilter};
use crate::state::AppState;

/// Product with its derived badges.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub badges: Vec<Badge>,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            badges: product.badges(),
            product,
        }
    }
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub tag: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<ListQuery> for ProductFilter {
    fn from(query: ListQuery) -> Self {
        Self {
            q: non_blank(query.q),
            tag: non_blank(query.tag),
            size: non_blank(query.size),
            color: non_blank(query.color),
            min_price: query.min_price,
            max_price: query.max_price,
            pagination: Pagination::new(query.page, query.per_page),
        }
    }
}

/// Active products, newest first.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<ProductView>>> {
    let page = state
        .stores()
        .products
        .list_active(&ProductFilter::from(query))
        .await?;

    Ok(Json(Page {
        items: page.items.into_iter().map(ProductView::from).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// Active product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductView>> {
    let product = state
        .stores()
        .products
        .get_by_slug(&slug)
        .await?
        .filter(Product::is_active)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    Ok(Json(product.into()))
}
