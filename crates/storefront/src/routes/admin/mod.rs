//! Admin back-office API.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin):
//! anonymous callers get 401, customers 403.

pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;

use crate::models::Pagination;
use crate::state::AppState;

/// `?page=&per_page=` on admin listings.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<&PageQuery> for Pagination {
    fn from(query: &PageQuery) -> Self {
        Self::new(query.page, query.per_page)
    }
}

/// Routes nested under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            get(products::show).patch(products::update),
        )
        .route("/products/{id}/status", post(products::set_status))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/fulfillment", post(orders::advance_fulfillment))
        .route("/users", get(users::index))
        .route("/users/{id}/role", post(users::set_role))
}
