//! Account route handlers. All require a signed-in user.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use threadline_core::{OrderId, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, Product};
use crate::state::AppState;

/// Orders placed by the user, plus guest orders placed with their email.
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = state
        .stores()
        .orders
        .list_for_customer(user.id, &user.email)
        .await?;
    Ok(Json(orders))
}

/// One of the user's orders. Other people's orders are reported as missing.
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    state
        .stores()
        .orders
        .get(id)
        .await?
        .filter(|order| order.is_visible_to(&user))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

pub async fn favorites(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.stores().users.favorites(user.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteInput {
    #[serde(alias = "product_id")]
    pub product_id: ProductId,
}

/// Save a product. Saving twice is a no-op.
pub async fn add_favorite(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(input): Json<FavoriteInput>,
) -> Result<StatusCode> {
    let product = state
        .stores()
        .products
        .get(input.product_id)
        .await?
        .filter(Product::is_active)
        .ok_or_else(|| AppError::NotFound(format!("product {}", input.product_id)))?;

    state
        .stores()
        .users
        .add_favorite(user.id, product.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    state
        .stores()
        .users
        .remove_favorite(user.id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
