//! Business logic services for storefront.
//!
//! Services borrow the [`Stores`](crate::db::Stores) (and, for checkout, the
//! payment gateway and config) for the duration of a request. Route handlers
//! construct them on demand; none holds state of its own.
//!
//! # Services
//!
//! - `auth` - Password registration/login and role management
//! - `cart` - Guest (session) and server cart operations
//! - `checkout` - Order creation and hosted payment sessions
//! - `webhooks` - Payment status reconciliation from provider events
//! - `admin` - Fulfillment workflow

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod webhooks;
