//! Checkout error types.

use thiserror::Error;

use threadline_core::PricingError;

use crate::db::RepositoryError;
use crate::payments::PaymentError;

/// Errors that can occur while placing or confirming an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No line items were submitted.
    #[error("cart is empty")]
    EmptyCart,

    /// Neither the form nor the session supplied an email.
    #[error("email is required")]
    EmailRequired,

    /// The supplied email is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] threadline_core::EmailError),

    /// A submitted line failed validation.
    #[error("item {index}: {reason}")]
    InvalidLine { index: usize, reason: String },

    /// A required address field is missing or blank.
    #[error("shipping address is incomplete: {0} is required")]
    AddressIncomplete(&'static str),

    /// Unknown shipping method.
    #[error("{0}")]
    InvalidShippingMethod(String),

    /// An amount cannot be expressed in minor units.
    #[error("amount out of range")]
    AmountOutOfRange,

    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// No order carries this payment session.
    #[error("order not found")]
    OrderNotFound,

    /// The payment provider failed to open a session.
    #[error("payment provider error: {0}")]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl CheckoutError {
    /// Whether the caller can fix the error by changing the submission.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyCart
                | Self::EmailRequired
                | Self::InvalidEmail(_)
                | Self::InvalidLine { .. }
                | Self::AddressIncomplete(_)
                | Self::InvalidShippingMethod(_)
                | Self::AmountOutOfRange
                | Self::Pricing(_)
        )
    }
}
