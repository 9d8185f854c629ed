//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness
//! GET  /health/ready               - Readiness (store ping)
//!
//! # Catalog
//! GET  /api/products               - Active products (search, filters, paging)
//! GET  /api/products/{slug}        - Product detail
//!
//! # Cart (guest session or signed-in user)
//! GET  /api/cart                   - Cart with subtotal
//! POST /api/cart/add               - Add a line
//! POST /api/cart/update            - Set a line's quantity (0 removes)
//! POST /api/cart/remove            - Remove a line
//! POST /api/cart/clear             - Empty the cart
//! GET  /api/cart/count             - Item count badge
//!
//! # Checkout (rate limited)
//! POST /api/checkout               - Create order, return payment URL
//! GET  /api/checkout/success       - Order status after payment redirect
//! GET  /api/shipping/quote         - Shipping cost for a subtotal
//!
//! # Payment provider
//! POST /webhooks                   - Signed provider events
//!
//! # Auth (register/login rate limited)
//! POST /api/auth/register
//! POST /api/auth/login
//! POST /api/auth/logout
//! GET  /api/auth/me
//!
//! # Account (requires auth)
//! GET    /api/account/orders
//! GET    /api/account/orders/{id}
//! GET    /api/account/favorites
//! POST   /api/account/favorites
//! DELETE /api/account/favorites/{product_id}
//!
//! # Admin (requires admin role), see [`admin`]
//! /api/admin/...
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::middleware::{auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/checkout", post(checkout::create))
        .layer(checkout_rate_limiter());

    Router::new()
        .route("/checkout/success", get(checkout::success))
        .route("/shipping/quote", get(checkout::shipping_quote))
        .merge(limited)
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
        .route(
            "/favorites",
            get(account::favorites).post(account::add_favorite),
        )
        .route("/favorites/{product_id}", delete(account::remove_favorite))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api", checkout_routes())
        .nest("/api/auth", auth_routes())
        .nest("/api/account", account_routes())
        .nest("/api/admin", admin::routes())
        .route("/webhooks", post(webhooks::receive))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.stores().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
