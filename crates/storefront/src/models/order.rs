//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadline_core::{
    CartLine, CurrencyCode, Email, FulfillmentStatus, Money, OrderId, PaymentStatus,
    ShippingMethod, UserId,
};

use super::Pagination;
use super::session::CurrentUser;

/// Shipping destination captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A placed order.
///
/// Line items, subtotal and shipping cost are frozen at creation. After
/// creation only three writers touch an order, each on its own fields:
/// checkout attaches the payment session, the webhook reconciler moves the
/// payment status (and overwrites `total` with the provider's confirmed
/// amount), and admins move the fulfillment status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub email: Email,
    pub items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub currency: CurrencyCode,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip)]
    pub checkout_url: Option<String>,
    #[serde(skip)]
    pub cart_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    /// Set once the post-payment side effects (cart clear, stock decrement)
    /// have completed.
    #[serde(skip)]
    pub inventory_committed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether `user` may view this order.
    ///
    /// Account orders match on user id. Guest orders (no user id) match on
    /// the contact email, so a guest who later registers sees them.
    #[must_use]
    pub fn is_visible_to(&self, user: &CurrentUser) -> bool {
        match self.user_id {
            Some(owner) => owner == user.id,
            None => self.email == user.email,
        }
    }

    /// Total number of units ordered.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }
}

/// Everything needed to insert a new `pending` order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub email: Email,
    pub items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub subtotal: Money,
    pub shipping_cost: Money,
    /// `subtotal + shipping_cost`.
    pub total: Money,
    pub currency: CurrencyCode,
    pub cart_hash: String,
}

/// Result of a conditional payment-status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The order moved to the requested status.
    Applied,
    /// The order was already in the requested status; nothing moved.
    AlreadyApplied,
    /// The transition table forbids the move from the current status.
    Rejected(PaymentStatus),
}

/// Admin order listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub payment_status: Option<PaymentStatus>,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub pagination: Pagination,
}

impl OrderFilter {
    /// Whether an order matches the status filters.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.payment_status
            .is_none_or(|status| order.payment_status == status)
            && self
                .fulfillment_status
                .is_none_or(|status| order.fulfillment_status == status)
    }
}
