//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `user` - Storefront accounts (customers and admins)
//! - `product` - Catalog, with `jsonb` variants and images
//! - `favorite` - Saved products per user
//! - `cart_item` - Server-side cart lines, one row per (user, product, size, color)
//! - `order` - Orders with denormalized `jsonb` line items and address
//! - `webhook_event` - Processed payment-provider event ids
//! - `tower_sessions.session` - Session storage
//!
//! # Stores
//!
//! Every table is reached through a repository trait ([`OrderStore`],
//! [`CartStore`], [`ProductStore`], [`UserStore`], [`WebhookEventStore`]).
//! [`Stores::postgres`] wires the `PostgreSQL` implementations; tests use
//! [`Stores::in_memory`], backed by [`memory::MemoryStore`].
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p threadline-cli -- migrate
//! ```

pub mod carts;
pub mod memory;
pub mod orders;
pub mod products;
pub mod users;
pub mod webhook_events;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::{CartRepository, CartStore};
pub use memory::MemoryStore;
pub use orders::{OrderRepository, OrderStore};
pub use products::{ProductRepository, ProductStore};
pub use users::{UserRepository, UserStore};
pub use webhook_events::{WebhookEventRepository, WebhookEventStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to [`RepositoryError::Conflict`].
    pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// The set of stores the application runs against.
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderStore>,
    pub carts: Arc<dyn CartStore>,
    pub products: Arc<dyn ProductStore>,
    pub users: Arc<dyn UserStore>,
    pub webhook_events: Arc<dyn WebhookEventStore>,
    pool: Option<PgPool>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            orders: Arc::new(OrderRepository::new(pool.clone())),
            carts: Arc::new(CartRepository::new(pool.clone())),
            products: Arc::new(ProductRepository::new(pool.clone())),
            users: Arc::new(UserRepository::new(pool.clone())),
            webhook_events: Arc::new(WebhookEventRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// In-memory stores sharing one [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::default()))
    }

    /// Stores backed by an existing [`MemoryStore`], so a test can keep a
    /// handle to inspect state.
    #[must_use]
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            orders: store.clone(),
            carts: store.clone(),
            products: store.clone(),
            users: store.clone(),
            webhook_events: store,
            pool: None,
        }
    }

    /// Check that the backing store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Store an optional variant option as the non-null column value.
pub(crate) fn option_column(value: Option<&String>) -> &str {
    value.map_or("", String::as_str)
}

/// Read a variant option column back, mapping `''` to `None`.
pub(crate) fn column_option(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
