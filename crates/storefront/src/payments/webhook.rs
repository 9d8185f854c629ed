//! Typed webhook event payloads.

use std::collections::HashMap;

use serde::Deserialize;

use super::{ORDER_ID_METADATA_KEY, PaymentError};

/// Envelope of every provider event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Provider event id (`evt_...`), the idempotency key.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The checkout-session object carried by `checkout.session.*` events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Confirmed amount in minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

impl CheckoutSessionObject {
    /// Our order id, when the session carries one.
    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        self.metadata.get(ORDER_ID_METADATA_KEY).map(String::as_str)
    }
}

/// The events the storefront reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted(CheckoutSessionObject),
    CheckoutExpired(CheckoutSessionObject),
    /// Acknowledged and ignored.
    Other,
}

impl WebhookEvent {
    /// Parse a raw (already verified) request body.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` if the body is not an event envelope.
    pub fn parse(payload: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(payload).map_err(|e| PaymentError::Parse(e.to_string()))
    }

    /// Classify the event and decode its object.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` if a checkout event's object is malformed.
    pub fn kind(&self) -> Result<PaymentEvent, PaymentError> {
        let session = || {
            serde_json::from_value::<CheckoutSessionObject>(self.data.object.clone())
                .map_err(|e| PaymentError::Parse(e.to_string()))
        };

        Ok(match self.event_type.as_str() {
            "checkout.session.completed" => PaymentEvent::CheckoutCompleted(session()?),
            "checkout.session.expired" => PaymentEvent::CheckoutExpired(session()?),
            _ => PaymentEvent::Other,
        })
    }
}
