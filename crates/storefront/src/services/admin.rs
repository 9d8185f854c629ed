//! Back-office operations that go beyond a single repository call.

use thiserror::Error;

use threadline_core::{FulfillmentStatus, OrderId, TransitionError};

use crate::db::{RepositoryError, Stores};
use crate::models::Order;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("order not found")]
    OrderNotFound,

    /// The fulfillment table forbids the move.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Another writer moved the order first.
    #[error("order changed concurrently, reload and retry")]
    Conflict,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct AdminService<'a> {
    stores: &'a Stores,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub const fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Move an order's fulfillment status one edge along the table.
    ///
    /// `tracking_number` is stored when given and kept otherwise.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidTransition` for an edge outside the table,
    /// or `Conflict` when the order moved between read and write.
    #[tracing::instrument(skip(self, tracking_number), fields(order_id = %id, to = %to))]
    pub async fn advance_fulfillment(
        &self,
        id: OrderId,
        to: FulfillmentStatus,
        tracking_number: Option<&str>,
    ) -> Result<Order, AdminError> {
        let order = self
            .stores
            .orders
            .get(id)
            .await?
            .ok_or(AdminError::OrderNotFound)?;

        let from = order.fulfillment_status;
        from.transition(to)?;

        let tracking_number = tracking_number.map(str::trim).filter(|t| !t.is_empty());
        if !self
            .stores
            .orders
            .update_fulfillment(id, from, to, tracking_number)
            .await?
        {
            return Err(AdminError::Conflict);
        }

        tracing::info!(from = %from, "Fulfillment status changed");

        self.stores
            .orders
            .get(id)
            .await?
            .ok_or(AdminError::OrderNotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use threadline_core::{CurrencyCode, Email, Money, ShippingMethod};

    use super::*;
    use crate::models::{NewOrder, ShippingAddress};

    async fn order(stores: &Stores) -> Order {
        stores
            .orders
            .create(NewOrder {
                user_id: None,
                email: Email::parse("guest@example.com").unwrap(),
                items: vec![],
                shipping_address: ShippingAddress {
                    name: "Guest".into(),
                    line1: "2 Mill Rd".into(),
                    line2: None,
                    city: "York".into(),
                    region: None,
                    postal_code: "YO1 7HH".into(),
                    country: "GB".into(),
                    phone: None,
                },
                shipping_method: ShippingMethod::Standard,
                subtotal: Money::new(Decimal::from(10)),
                shipping_cost: Money::new(Decimal::from(5)),
                total: Money::new(Decimal::from(15)),
                currency: CurrencyCode::Usd,
                cart_hash: "h".into(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_advance_one_step_at_a_time() {
        let stores = Stores::in_memory();
        let order = order(&stores).await;
        let admin = AdminService::new(&stores);

        assert!(matches!(
            admin
                .advance_fulfillment(order.id, FulfillmentStatus::Shipped, None)
                .await,
            Err(AdminError::InvalidTransition(_))
        ));

        admin
            .advance_fulfillment(order.id, FulfillmentStatus::Processing, None)
            .await
            .unwrap();
        let shipped = admin
            .advance_fulfillment(order.id, FulfillmentStatus::Shipped, Some(" 1Z999 "))
            .await
            .unwrap();

        assert_eq!(shipped.fulfillment_status, FulfillmentStatus::Shipped);
        assert_eq!(shipped.tracking_number.as_deref(), Some("1Z999"));
    }

    #[tokio::test]
    async fn test_cannot_cancel_after_shipping() {
        let stores = Stores::in_memory();
        let order = order(&stores).await;
        let admin = AdminService::new(&stores);

        for status in [FulfillmentStatus::Processing, FulfillmentStatus::Shipped] {
            admin
                .advance_fulfillment(order.id, status, None)
                .await
                .unwrap();
        }

        assert!(matches!(
            admin
                .advance_fulfillment(order.id, FulfillmentStatus::Canceled, None)
                .await,
            Err(AdminError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let stores = Stores::in_memory();

        assert!(matches!(
            AdminService::new(&stores)
                .advance_fulfillment(OrderId::new(42), FulfillmentStatus::Processing, None)
                .await,
            Err(AdminError::OrderNotFound)
        ));
    }
}
