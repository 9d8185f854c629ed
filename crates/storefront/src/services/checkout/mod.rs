//! Checkout: turn a submitted cart into a `pending` order and a hosted
//! payment session.
//!
//! Prices are never taken from the client. Every line is re-read from the
//! catalog, shipping is recomputed from [`ShippingPolicy`], and the payment
//! session is opened for exactly the amounts frozen on the order.
//!
//! Submitting the same cart twice within [`REUSE_WINDOW_HOURS`] returns the
//! existing order instead of creating a second one. If the earlier attempt
//! never got a payment session (provider outage), the retry opens one for
//! the existing order.
//!
//! [`ShippingPolicy`]: threadline_core::ShippingPolicy

mod error;
mod submission;

pub use error::CheckoutError;
pub use submission::{
    CheckoutSubmission, RequestedLine, SubmittedAddress, SubmittedCustomer, SubmittedLine,
    SubmittedShipping, ValidatedCheckout, cart_hash,
};

use chrono::{Duration, Utc};
use tower_sessions::Session;

use threadline_core::{CartLine, MAX_LINE_QUANTITY, Money, OrderId, ShippingMethod};

use super::cart::{CartOwner, CartService, CartServiceError};
use crate::config::StorefrontConfig;
use crate::db::Stores;
use crate::models::{CurrentUser, NewOrder, Order, session_keys};
use crate::payments::{
    CheckoutSessionRequest, PaymentGateway, SESSION_ID_PLACEHOLDER, SessionLineItem,
    SessionShipping,
};

/// How long a pending order is reused for an identical submission.
pub const REUSE_WINDOW_HOURS: i64 = 24;

/// Orders remembered per session for the payment-return page.
const MAX_REMEMBERED_ORDERS: usize = 10;

/// How [`CheckoutService::place_order`] arrived at its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// A new order and payment session.
    Created,
    /// An existing order without a session got a new session.
    Resumed,
    /// An existing order and its session were returned unchanged.
    Reused,
}

/// Order behind a payment return, and whether the caller placed it.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub order: Order,
    pub owned: bool,
}

/// Result of a successful checkout submission.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    /// Hosted payment page to redirect to.
    pub checkout_url: String,
    pub outcome: CheckoutOutcome,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    stores: &'a Stores,
    gateway: &'a dyn PaymentGateway,
    config: &'a StorefrontConfig,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        stores: &'a Stores,
        gateway: &'a dyn PaymentGateway,
        config: &'a StorefrontConfig,
    ) -> Self {
        Self {
            stores,
            gateway,
            config,
        }
    }

    /// Validate and price a submission, then create (or reuse) the order and
    /// open its payment session.
    ///
    /// # Errors
    ///
    /// Validation failures come back as the matching [`CheckoutError`]
    /// variant with nothing written. `Payment` means the order exists but
    /// has no session yet; resubmitting resumes it.
    #[tracing::instrument(skip_all, fields(user_id = user.map(|u| u.id.as_i32())))]
    pub async fn place_order(
        &self,
        submission: &CheckoutSubmission,
        user: Option<&CurrentUser>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let checkout = submission.validate(user.map(|u| u.id), user.map(|u| &u.email))?;
        let lines = self.price_lines(&checkout).await?;

        let subtotal = threadline_core::subtotal(&lines);
        let shipping_cost = self.config.shipping.shipping_cost(subtotal, checkout.method)?;
        let total = subtotal + shipping_cost;
        if total.to_minor_units().is_none() {
            return Err(CheckoutError::AmountOutOfRange);
        }

        let hash = cart_hash(&checkout, &lines);
        let since = Utc::now() - Duration::hours(REUSE_WINDOW_HOURS);

        if let Some(order) = self
            .stores
            .orders
            .find_pending_by_cart_hash(&hash, since)
            .await?
        {
            if let (Some(_), Some(url)) = (&order.payment_session_id, &order.checkout_url) {
                tracing::info!(order_id = %order.id, "Reusing pending order for duplicate checkout");
                return Ok(PlacedOrder {
                    order_id: order.id,
                    checkout_url: url.clone(),
                    outcome: CheckoutOutcome::Reused,
                });
            }

            let checkout_url = self.open_session(&order).await?;
            tracing::info!(order_id = %order.id, "Resumed pending order");
            return Ok(PlacedOrder {
                order_id: order.id,
                checkout_url,
                outcome: CheckoutOutcome::Resumed,
            });
        }

        let order = self
            .stores
            .orders
            .create(NewOrder {
                user_id: checkout.user_id,
                email: checkout.email,
                items: lines,
                shipping_address: checkout.address,
                shipping_method: checkout.method,
                subtotal,
                shipping_cost,
                total,
                currency: self.config.currency,
                cart_hash: hash,
            })
            .await?;

        tracing::info!(order_id = %order.id, total = %order.total, "Order created");

        let checkout_url = self.open_session(&order).await?;
        Ok(PlacedOrder {
            order_id: order.id,
            checkout_url,
            outcome: CheckoutOutcome::Created,
        })
    }

    /// Look up the order for a completed payment redirect and, when the
    /// caller placed it, empty their cart.
    ///
    /// The caller owns the order if this session placed it (see
    /// [`remember_order`]) or it is visible to the signed-in user. Anyone
    /// else holding the payment session id learns only the payment status
    /// and their cart is left alone.
    ///
    /// Safe to call repeatedly. The order's payment status is whatever the
    /// webhook has recorded so far.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` when no order carries `session_id`.
    pub async fn confirm(
        &self,
        session_id: &str,
        session: &Session,
        user: Option<&CurrentUser>,
    ) -> Result<Confirmation, CheckoutError> {
        let order = self
            .stores
            .orders
            .find_by_session(session_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        let placed: Vec<OrderId> = session
            .get(session_keys::PLACED_ORDERS)
            .await?
            .unwrap_or_default();
        let owned = placed.contains(&order.id) || user.is_some_and(|u| order.is_visible_to(u));
        if !owned {
            tracing::info!(order_id = %order.id, "Payment return for an order placed elsewhere");
            return Ok(Confirmation { order, owned });
        }

        let carts = CartService::new(self.stores);
        carts
            .clear(CartOwner::Guest(session))
            .await
            .map_err(storage_error)?;
        if let Some(user) = user {
            carts
                .clear(CartOwner::User(user.id))
                .await
                .map_err(storage_error)?;
        }

        Ok(Confirmation { order, owned })
    }

    /// Re-price every submitted line from the catalog, merging repeated keys.
    ///
    /// Lines keep their submitted order.
    async fn price_lines(
        &self,
        checkout: &ValidatedCheckout,
    ) -> Result<Vec<CartLine>, CheckoutError> {
        let carts = CartService::new(self.stores);
        let mut lines: Vec<CartLine> = Vec::with_capacity(checkout.lines.len());

        for (index, requested) in checkout.lines.iter().enumerate() {
            let line = carts
                .snapshot_line(requested.key.clone(), i64::from(requested.quantity))
                .await
                .map_err(|e| line_error(index, e))?;

            if line.unit_price.to_minor_units().is_none() {
                return Err(CheckoutError::AmountOutOfRange);
            }

            match lines.iter_mut().find(|l| l.key == line.key) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .saturating_add(line.quantity)
                        .min(MAX_LINE_QUANTITY);
                }
                None => lines.push(line),
            }
        }

        Ok(lines)
    }

    /// Open a hosted payment session for `order` and record it.
    async fn open_session(&self, order: &Order) -> Result<String, CheckoutError> {
        let request = self.session_request(order)?;
        let session = self.gateway.create_checkout_session(&request).await?;

        self.stores
            .orders
            .attach_session(order.id, &session.id, &session.url)
            .await?;

        tracing::info!(order_id = %order.id, session_id = %session.id, "Payment session opened");
        Ok(session.url)
    }

    fn session_request(&self, order: &Order) -> Result<CheckoutSessionRequest, CheckoutError> {
        let line_items = order
            .items
            .iter()
            .map(|line| {
                Ok(SessionLineItem {
                    name: line_name(line),
                    unit_amount: minor_units(line.unit_price)?,
                    quantity: line.quantity,
                    image: line.image.clone(),
                })
            })
            .collect::<Result<Vec<_>, CheckoutError>>()?;

        Ok(CheckoutSessionRequest {
            line_items,
            shipping: SessionShipping {
                display_name: shipping_label(order.shipping_method).to_owned(),
                amount: minor_units(order.shipping_cost)?,
            },
            currency: order.currency.as_str().to_owned(),
            customer_email: order.email.to_string(),
            success_url: self.config.url(&format!(
                "/checkout/success?session_id={SESSION_ID_PLACEHOLDER}"
            )),
            cancel_url: self.config.url("/cart"),
            order_id: order.id.to_string(),
        })
    }
}

fn minor_units(amount: Money) -> Result<i64, CheckoutError> {
    amount
        .to_minor_units()
        .ok_or(CheckoutError::AmountOutOfRange)
}

/// Display name with the chosen variant, e.g. `Field Tee (M / black)`.
fn line_name(line: &CartLine) -> String {
    let variant: Vec<&str> = [line.key.size.as_deref(), line.key.color.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if variant.is_empty() {
        line.title.clone()
    } else {
        format!("{} ({})", line.title, variant.join(" / "))
    }
}

const fn shipping_label(method: ShippingMethod) -> &'static str {
    match method {
        ShippingMethod::Standard => "Standard shipping",
        ShippingMethod::Express => "Express shipping",
    }
}

fn line_error(index: usize, error: CartServiceError) -> CheckoutError {
    match error {
        CartServiceError::Repository(e) => CheckoutError::Repository(e),
        CartServiceError::Session(e) => CheckoutError::Session(e),
        other => CheckoutError::InvalidLine {
            index,
            reason: other.to_string(),
        },
    }
}

/// Remember that this browser session placed `order_id`, so its payment
/// return page may show the order and clear the cart.
///
/// # Errors
///
/// Returns `Session` if the session store fails.
pub async fn remember_order(session: &Session, order_id: OrderId) -> Result<(), CheckoutError> {
    let mut placed: Vec<OrderId> = session
        .get(session_keys::PLACED_ORDERS)
        .await?
        .unwrap_or_default();
    if placed.contains(&order_id) {
        return Ok(());
    }

    placed.push(order_id);
    if placed.len() > MAX_REMEMBERED_ORDERS {
        placed.remove(0);
    }
    session.insert(session_keys::PLACED_ORDERS, placed).await?;
    Ok(())
}

fn storage_error(error: CartServiceError) -> CheckoutError {
    match error {
        CartServiceError::Session(e) => CheckoutError::Session(e),
        CartServiceError::Repository(e) => CheckoutError::Repository(e),
        other => CheckoutError::Repository(crate::db::RepositoryError::DataCorruption(
            other.to_string(),
        )),
    }
}
