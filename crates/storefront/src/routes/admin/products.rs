//! Admin product management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use threadline_core::{ProductId, ProductStatus};

use super::PageQuery;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Page, Product, ProductUpdate, Variant};
use crate::state::AppState;

/// All products, hidden included, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Product>>> {
    let page = state.stores().products.list_all((&query).into()).await?;
    Ok(Json(page))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .stores()
        .products
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

#[instrument(skip_all, fields(admin_id = %admin.id, slug = %input.slug))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let slug = input.slug.trim();
    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(AppError::BadRequest(
            "slug must be lowercase letters, digits and dashes".into(),
        ));
    }
    if input.title.trim().is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }
    if !input.price.is_positive() {
        return Err(AppError::BadRequest("price must be positive".into()));
    }
    validate_variants(&input.variants)?;

    let product = state
        .stores()
        .products
        .create(NewProduct {
            slug: slug.to_owned(),
            ..input
        })
        .await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    if input.price.is_some_and(|p| !p.is_positive()) {
        return Err(AppError::BadRequest("price must be positive".into()));
    }
    if let Some(variants) = &input.variants {
        validate_variants(variants)?;
    }

    let product = state.stores().products.update(id, input).await?;
    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
pub struct StatusInput {
    pub status: ProductStatus,
}

/// Show or hide a product.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id, status = %input.status))]
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(input): Json<StatusInput>,
) -> Result<StatusCode> {
    state.stores().products.set_status(id, input.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_variants(variants: &[Variant]) -> Result<()> {
    if variants.iter().any(|v| v.stock < 0) {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }
    Ok(())
}
