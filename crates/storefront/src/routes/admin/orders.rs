//! Admin order management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use threadline_core::{FulfillmentStatus, OrderId, PaymentStatus};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderFilter, Page, Pagination};
use crate::services::admin::AdminService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub payment_status: Option<PaymentStatus>,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Orders, newest first, optionally filtered by status.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Page<Order>>> {
    let filter = OrderFilter {
        payment_status: query.payment_status,
        fulfillment_status: query.fulfillment_status,
        pagination: Pagination::new(query.page, query.per_page),
    };
    Ok(Json(state.stores().orders.list(filter).await?))
}

pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    state
        .stores()
        .orders
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentInput {
    pub status: FulfillmentStatus,
    #[serde(default, alias = "tracking_number")]
    pub tracking: Option<String>,
}

/// Move the order along the fulfillment workflow.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn advance_fulfillment(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(input): Json<FulfillmentInput>,
) -> Result<Json<Order>> {
    let order = AdminService::new(state.stores())
        .advance_fulfillment(id, input.status, input.tracking.as_deref())
        .await?;
    Ok(Json(order))
}
