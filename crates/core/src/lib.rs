//! Threadline Core - Shared domain library.
//!
//! This crate provides the types and pure domain logic used across all
//! Threadline components:
//! - `storefront` - Public storefront API, checkout, webhooks and admin back-office
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and lets the same pricing
//! and cart rules run wherever they are needed.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`cart`] - Composite-key cart store shared by guest and server carts
//! - [`pricing`] - Shipping cost policy and subtotal computation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod pricing;
pub mod types;

pub use cart::{Cart, CartError, CartKey, CartLine, MAX_LINE_QUANTITY};
pub use pricing::{PricingError, ShippingMethod, ShippingPolicy, subtotal};
pub use types::*;
