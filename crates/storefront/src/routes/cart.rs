//! Cart route handlers.
//!
//! Signed-in users operate on their server cart; everyone else on the guest
//! cart held in the session. Every mutation responds with the updated cart.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use threadline_core::{Cart, CartKey, CartLine, Money, ProductId};

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::services::cart::{CartOwner, CartService};
use crate::state::AppState;

/// Cart line as returned to the client.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total: Money,
}

/// Cart as returned to the client.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub subtotal: Money,
    pub item_count: u32,
    /// Amount left before express shipping is free.
    pub free_shipping_remaining: Money,
}

impl CartView {
    fn new(cart: Cart, state: &AppState) -> Self {
        let subtotal = cart.subtotal();
        let item_count = cart.item_count();
        Self {
            items: cart
                .into_lines()
                .into_iter()
                .map(|line| CartLineView {
                    line_total: line.line_total(),
                    line,
                })
                .collect(),
            subtotal,
            item_count,
            free_shipping_remaining: state
                .config()
                .shipping
                .remaining_for_free_shipping(subtotal),
        }
    }
}

/// Identifies a cart line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineKeyInput {
    #[serde(alias = "product_id")]
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl LineKeyInput {
    fn into_key(self) -> CartKey {
        CartKey::new(self.product_id, self.size, self.color)
    }
}

/// Add-to-cart and update payload.
#[derive(Debug, Deserialize)]
pub struct QuantityInput {
    #[serde(flatten)]
    pub key: LineKeyInput,
    #[serde(alias = "quantity", default = "one")]
    pub qty: i64,
}

const fn one() -> i64 {
    1
}

fn owner<'s>(auth: &OptionalAuth, session: &'s Session) -> CartOwner<'s> {
    auth.0
        .as_ref()
        .map_or(CartOwner::Guest(session), |user| CartOwner::User(user.id))
}

/// Current cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    auth: OptionalAuth,
    session: Session,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.stores())
        .get(owner(&auth, &session))
        .await?;
    Ok(Json(CartView::new(cart, &state)))
}

/// Add a product; quantities for an existing line are summed.
#[instrument(skip_all, fields(product_id = %input.key.product_id, qty = input.qty))]
pub async fn add(
    State(state): State<AppState>,
    auth: OptionalAuth,
    session: Session,
    Json(input): Json<QuantityInput>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.stores())
        .add(owner(&auth, &session), input.key.into_key(), input.qty)
        .await?;
    Ok(Json(CartView::new(cart, &state)))
}

/// Set a line's quantity; zero removes it.
#[instrument(skip_all, fields(product_id = %input.key.product_id, qty = input.qty))]
pub async fn update(
    State(state): State<AppState>,
    auth: OptionalAuth,
    session: Session,
    Json(input): Json<QuantityInput>,
) -> Result<Json<CartView>> {
    let key = input.key.into_key();
    let cart = CartService::new(state.stores())
        .update(owner(&auth, &session), &key, input.qty)
        .await?;
    Ok(Json(CartView::new(cart, &state)))
}

/// Remove a line.
#[instrument(skip_all, fields(product_id = %input.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    auth: OptionalAuth,
    session: Session,
    Json(input): Json<LineKeyInput>,
) -> Result<Json<CartView>> {
    let key = input.into_key();
    let cart = CartService::new(state.stores())
        .remove(owner(&auth, &session), &key)
        .await?;
    Ok(Json(CartView::new(cart, &state)))
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    auth: OptionalAuth,
    session: Session,
) -> Result<Json<CartView>> {
    CartService::new(state.stores())
        .clear(owner(&auth, &session))
        .await?;
    Ok(Json(CartView::new(Cart::new(), &state)))
}

/// Item count for the header badge.
pub async fn count(
    State(state): State<AppState>,
    auth: OptionalAuth,
    session: Session,
) -> Result<Json<Value>> {
    let cart = CartService::new(state.stores())
        .get(owner(&auth, &session))
        .await?;
    Ok(Json(json!({ "count": cart.item_count() })))
}
