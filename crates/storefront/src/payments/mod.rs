//! Hosted payment provider integration.
//!
//! [`PaymentGateway`] is the seam checkout talks to; [`StripeClient`] is the
//! production implementation. Incoming webhooks are authenticated by
//! [`WebhookVerifier`] and parsed into [`WebhookEvent`].

mod error;
mod signature;
mod stripe;
mod webhook;

use async_trait::async_trait;
use serde::Serialize;

pub use error::PaymentError;
pub use signature::{SIGNATURE_TOLERANCE_SECS, WebhookVerifier};
pub use stripe::StripeClient;
pub use webhook::{CheckoutSessionObject, PaymentEvent, WebhookEvent};

/// Metadata key carrying our order id on a payment session.
pub const ORDER_ID_METADATA_KEY: &str = "order_id";

/// Placeholder the provider substitutes with the session id in redirect URLs.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// One purchasable line on a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLineItem {
    pub name: String,
    /// Unit price in minor units (cents).
    pub unit_amount: i64,
    pub quantity: u32,
    pub image: Option<String>,
}

/// Flat shipping charge shown on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionShipping {
    pub display_name: String,
    /// Amount in minor units (cents).
    pub amount: i64,
}

/// Everything needed to open a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub shipping: SessionShipping,
    /// Lowercase ISO currency code.
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Our order id, echoed back in webhook metadata.
    pub order_id: String,
}

/// An opened hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Provider session handle (`cs_...`).
    pub id: String,
    /// Hosted page the customer is redirected to.
    pub url: String,
}

/// Opens hosted payment sessions.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}
