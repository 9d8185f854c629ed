//! Checkout, payment redirect and shipping quote handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use threadline_core::{FulfillmentStatus, Money, OrderId, PaymentStatus, ShippingMethod};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::services::checkout::{
    CheckoutService, CheckoutSubmission, Confirmation, remember_order,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub order_id: OrderId,
}

/// Create (or reuse) an order and return the hosted payment URL.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(submission): Json<CheckoutSubmission>,
) -> Result<Json<CheckoutResponse>> {
    let placed = CheckoutService::new(state.stores(), state.gateway(), state.config())
        .place_order(&submission, user.as_ref())
        .await?;
    remember_order(&session, placed.order_id).await?;

    add_breadcrumb(
        "checkout",
        "Redirecting to payment",
        &[("order_id", placed.order_id.to_string())],
    );

    Ok(Json(CheckoutResponse {
        url: placed.checkout_url,
        order_id: placed.order_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: String,
}

/// Order details are only included for the customer who placed the order.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_status: Option<FulfillmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Money>,
}

/// Landing point after payment. Reports the payment status the webhook has
/// recorded so far and, for the customer who placed the order, clears their
/// cart.
#[instrument(skip_all)]
pub async fn success(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<SuccessResponse>> {
    let Confirmation { order, owned } =
        CheckoutService::new(state.stores(), state.gateway(), state.config())
            .confirm(&query.session_id, &session, user.as_ref())
            .await?;

    Ok(Json(SuccessResponse {
        payment_status: order.payment_status,
        order_id: owned.then_some(order.id),
        fulfillment_status: owned.then_some(order.fulfillment_status),
        total: owned.then_some(order.total),
    }))
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub subtotal: Money,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub method: ShippingMethod,
    pub cost: Money,
    pub free_shipping_remaining: Money,
}

/// Shipping quote with the same policy checkout charges.
pub async fn shipping_quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>> {
    let method = query
        .method
        .as_deref()
        .map_or(Ok(ShippingMethod::Standard), str::parse)
        .map_err(AppError::BadRequest)?;

    let policy = &state.config().shipping;
    let cost = policy
        .shipping_cost(query.subtotal, method)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(Json(QuoteResponse {
        method,
        cost,
        free_shipping_remaining: policy.remaining_for_free_shipping(query.subtotal),
    }))
}
