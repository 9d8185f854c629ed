//! In-memory implementation of every store.
//!
//! Used by tests and by local development without a database. Each operation
//! takes the single lock for its whole duration, which gives it the same
//! atomicity as the conditional `UPDATE`s in the `PostgreSQL` repositories.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use threadline_core::{
    Cart, CartKey, CartLine, Email, FulfillmentStatus, Money, OrderId, PaymentStatus, ProductId,
    ProductStatus, UserId, UserRole,
};

use super::{CartStore, OrderStore, ProductStore, RepositoryError, UserStore, WebhookEventStore};
use crate::models::{
    NewOrder, NewProduct, Order, OrderFilter, Page, Pagination, Product, ProductFilter,
    ProductUpdate, TransitionOutcome, User,
};

#[derive(Default)]
struct MemoryState {
    users: Vec<(User, String)>,
    products: Vec<Product>,
    /// Oldest first.
    favorites: Vec<(UserId, ProductId)>,
    carts: HashMap<UserId, Cart>,
    orders: Vec<Order>,
    webhook_events: HashMap<String, String>,
    next_user_id: i32,
    next_product_id: i32,
    next_order_id: i32,
}

impl MemoryState {
    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, RepositoryError> {
        self.orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(RepositoryError::NotFound)
    }

    fn product_mut(&mut self, id: ProductId) -> Result<&mut Product, RepositoryError> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepositoryError::NotFound)
    }
}

/// Shared in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every order, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    /// Number of recorded webhook events.
    #[must_use]
    pub fn webhook_event_count(&self) -> usize {
        self.lock().webhook_events.len()
    }
}

/// Newest-first page over an oldest-first slice.
fn paginate<T: Clone>(items: &[&T], pagination: Pagination) -> Page<T> {
    let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(pagination.limit()).unwrap_or(usize::MAX);
    let page = items
        .iter()
        .rev()
        .skip(offset)
        .take(limit)
        .map(|item| (*item).clone())
        .collect();
    let total = i64::try_from(items.len()).unwrap_or(i64::MAX);
    Page::new(page, total, pagination)
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.lock();
        state.next_order_id += 1;
        let now = Utc::now();

        let order = Order {
            id: OrderId::new(state.next_order_id),
            user_id: order.user_id,
            email: order.email,
            items: order.items,
            shipping_address: order.shipping_address,
            shipping_method: order.shipping_method,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
            currency: order.currency,
            payment_status: PaymentStatus::Pending,
            fulfillment_status: FulfillmentStatus::Created,
            payment_session_id: None,
            payment_intent_id: None,
            checkout_url: None,
            cart_hash: order.cart_hash,
            tracking_number: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            inventory_committed_at: None,
        };
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.lock().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|o| o.payment_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn find_pending_by_cart_hash(
        &self,
        cart_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .rev()
            .find(|o| {
                o.cart_hash == cart_hash
                    && o.payment_status == PaymentStatus::Pending
                    && o.created_at >= since
            })
            .cloned())
    }

    async fn attach_session(
        &self,
        id: OrderId,
        session_id: &str,
        checkout_url: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if state
            .orders
            .iter()
            .any(|o| o.id != id && o.payment_session_id.as_deref() == Some(session_id))
        {
            return Err(RepositoryError::Conflict(
                "payment session already exists".to_owned(),
            ));
        }

        let order = state.order_mut(id)?;
        order.payment_session_id = Some(session_id.to_owned());
        order.checkout_url = Some(checkout_url.to_owned());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_paid(
        &self,
        id: OrderId,
        total: Money,
        payment_intent_id: Option<&str>,
    ) -> Result<TransitionOutcome, RepositoryError> {
        let mut state = self.lock();
        let order = state.order_mut(id)?;
        let now = Utc::now();

        let outcome = match order.payment_status {
            PaymentStatus::Pending => {
                order.payment_status = PaymentStatus::Paid;
                order.paid_at = Some(now);
                TransitionOutcome::Applied
            }
            PaymentStatus::Paid => TransitionOutcome::AlreadyApplied,
            current @ PaymentStatus::Canceled => return Ok(TransitionOutcome::Rejected(current)),
        };

        order.total = total;
        if let Some(intent) = payment_intent_id {
            order.payment_intent_id = Some(intent.to_owned());
        }
        order.updated_at = now;
        Ok(outcome)
    }

    async fn mark_canceled(&self, id: OrderId) -> Result<TransitionOutcome, RepositoryError> {
        let mut state = self.lock();
        let order = state.order_mut(id)?;

        Ok(match order.payment_status {
            PaymentStatus::Pending => {
                order.payment_status = PaymentStatus::Canceled;
                order.updated_at = Utc::now();
                TransitionOutcome::Applied
            }
            PaymentStatus::Canceled => TransitionOutcome::AlreadyApplied,
            current @ PaymentStatus::Paid => TransitionOutcome::Rejected(current),
        })
    }

    async fn list_for_customer(
        &self,
        user_id: UserId,
        email: &Email,
    ) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .rev()
            .filter(|o| match o.user_id {
                Some(owner) => owner == user_id,
                None => &o.email == email,
            })
            .cloned()
            .collect())
    }

    async fn list(&self, filter: OrderFilter) -> Result<Page<Order>, RepositoryError> {
        let state = self.lock();
        let matching: Vec<&Order> = state.orders.iter().filter(|o| filter.matches(o)).collect();
        Ok(paginate(&matching, filter.pagination))
    }

    async fn update_fulfillment(
        &self,
        id: OrderId,
        from: FulfillmentStatus,
        to: FulfillmentStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        let order = state.order_mut(id)?;
        if order.fulfillment_status != from {
            return Ok(false);
        }

        order.fulfillment_status = to;
        if let Some(tracking) = tracking_number {
            order.tracking_number = Some(tracking.to_owned());
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_inventory_committed(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        let order = state.order_mut(id)?;
        if order.inventory_committed_at.is_some() {
            return Ok(false);
        }

        let now = Utc::now();
        order.inventory_committed_at = Some(now);
        order.updated_at = now;
        Ok(true)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        Ok(self.lock().carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn add(&self, user_id: UserId, line: CartLine) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        let cart = state.carts.entry(user_id).or_default();
        // Zero-quantity adds are ignored, as in the upsert.
        let _ = cart.add(line);
        Ok(())
    }

    async fn update(
        &self,
        user_id: UserId,
        key: &CartKey,
        quantity: i64,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        Ok(state
            .carts
            .get_mut(&user_id)
            .is_some_and(|cart| cart.update(key, quantity)))
    }

    async fn remove(&self, user_id: UserId, key: &CartKey) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        Ok(state
            .carts
            .get_mut(&user_id)
            .is_some_and(|cart| cart.remove(key)))
    }

    async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.lock().carts.remove(&user_id);
        Ok(())
    }

    async fn merge(&self, user_id: UserId, cart: Cart) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        state.carts.entry(user_id).or_default().merge(cart);
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list_active(&self, filter: &ProductFilter) -> Result<Page<Product>, RepositoryError> {
        let state = self.lock();
        let matching: Vec<&Product> = state
            .products
            .iter()
            .filter(|p| p.is_active() && p.matches(filter))
            .collect();
        Ok(paginate(&matching, filter.pagination))
    }

    async fn list_all(&self, pagination: Pagination) -> Result<Page<Product>, RepositoryError> {
        let state = self.lock();
        let all: Vec<&Product> = state.products.iter().collect();
        Ok(paginate(&all, pagination))
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock().products.iter().find(|p| p.slug == slug).cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.lock();
        if state.products.iter().any(|p| p.slug == product.slug) {
            return Err(RepositoryError::Conflict(
                "product slug already exists".to_owned(),
            ));
        }

        state.next_product_id += 1;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(state.next_product_id),
            slug: product.slug,
            title: product.title,
            description: product.description,
            price: product.price,
            status: product.status,
            tags: product.tags,
            images: product.images,
            variants: product.variants,
            created_at: now,
            updated_at: now,
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.lock();
        let product = state.product_mut(id)?;
        update.apply(product);
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn set_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        let product = state.product_mut(id)?;
        product.status = status;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn decrement_stock(&self, lines: &[CartLine]) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        for line in lines {
            let Ok(product) = state.product_mut(line.key.product_id) else {
                continue;
            };
            if let Some(variant) = product.variants.iter_mut().find(|v| v.matches(&line.key)) {
                let sold = i32::try_from(line.quantity).unwrap_or(i32::MAX);
                variant.stock = variant.stock.saturating_sub(sold).max(0);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let mut state = self.lock();
        if state.users.iter().any(|(u, _)| &u.email == email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        state.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: UserId::new(state.next_user_id),
            email: email.clone(),
            role,
            created_at: now,
            updated_at: now,
        };
        state.users.push((user.clone(), password_hash.to_owned()));
        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| u.clone()))
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|(u, _)| &u.email == email)
            .map(|(u, _)| u.clone()))
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|(u, _)| &u.email == email)
            .cloned())
    }

    async fn list(&self, pagination: Pagination) -> Result<Page<User>, RepositoryError> {
        let state = self.lock();
        let users: Vec<&User> = state.users.iter().map(|(u, _)| u).collect();
        Ok(paginate(&users, pagination))
    }

    async fn set_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError> {
        let mut state = self.lock();
        let (user, _) = state
            .users
            .iter_mut()
            .find(|(u, _)| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn favorites(&self, id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .favorites
            .iter()
            .rev()
            .filter(|(user_id, _)| *user_id == id)
            .filter_map(|(_, product_id)| state.products.iter().find(|p| p.id == *product_id))
            .filter(|p| p.is_active())
            .cloned()
            .collect())
    }

    async fn add_favorite(
        &self,
        id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if !state.products.iter().any(|p| p.id == product_id) {
            return Err(RepositoryError::NotFound);
        }
        if !state.favorites.contains(&(id, product_id)) {
            state.favorites.push((id, product_id));
        }
        Ok(())
    }

    async fn remove_favorite(
        &self,
        id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        let before = state.favorites.len();
        state.favorites.retain(|entry| *entry != (id, product_id));
        Ok(state.favorites.len() != before)
    }
}

#[async_trait]
impl WebhookEventStore for MemoryStore {
    async fn is_processed(&self, event_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.lock().webhook_events.contains_key(event_id))
    }

    async fn record(&self, event_id: &str, event_type: &str) -> Result<(), RepositoryError> {
        self.lock()
            .webhook_events
            .entry(event_id.to_owned())
            .or_insert_with(|| event_type.to_owned());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use threadline_core::{CurrencyCode, ShippingMethod};

    use super::*;
    use crate::models::ShippingAddress;

    fn new_order(hash: &str) -> NewOrder {
        let total = Money::new(Decimal::from(33));
        NewOrder {
            user_id: None,
            email: Email::parse("guest@example.com").unwrap(),
            items: vec![],
            shipping_address: ShippingAddress {
                name: "Ada".into(),
                line1: "1 Loom St".into(),
                line2: None,
                city: "Leeds".into(),
                region: None,
                postal_code: "LS1".into(),
                country: "GB".into(),
                phone: None,
            },
            shipping_method: ShippingMethod::Standard,
            subtotal: Money::new(Decimal::from(28)),
            shipping_cost: Money::new(Decimal::from(5)),
            total,
            currency: CurrencyCode::default(),
            cart_hash: hash.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_mark_paid_outcomes() {
        let store = MemoryStore::new();
        let order = OrderStore::create(&store, new_order("h")).await.unwrap();
        let confirmed = Money::new(Decimal::from(30));

        let first = store.mark_paid(order.id, confirmed, Some("pi_1")).await.unwrap();
        let second = store.mark_paid(order.id, confirmed, None).await.unwrap();
        assert_eq!(first, TransitionOutcome::Applied);
        assert_eq!(second, TransitionOutcome::AlreadyApplied);

        let stored = OrderStore::get(&store, order.id).await.unwrap().unwrap();
        assert_eq!(stored.total, confirmed);
        assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_1"));

        let cancel = store.mark_canceled(order.id).await.unwrap();
        assert_eq!(cancel, TransitionOutcome::Rejected(PaymentStatus::Paid));
    }

    #[tokio::test]
    async fn test_canceled_order_cannot_be_paid() {
        let store = MemoryStore::new();
        let order = OrderStore::create(&store, new_order("h")).await.unwrap();

        store.mark_canceled(order.id).await.unwrap();
        let outcome = store
            .mark_paid(order.id, Money::new(Decimal::from(33)), None)
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Rejected(PaymentStatus::Canceled));
    }

    #[tokio::test]
    async fn test_find_pending_by_cart_hash_skips_paid() {
        let store = MemoryStore::new();
        let since = Utc::now() - chrono::Duration::hours(24);
        let order = OrderStore::create(&store, new_order("abc")).await.unwrap();

        let found = store.find_pending_by_cart_hash("abc", since).await.unwrap();
        assert_eq!(found.map(|o| o.id), Some(order.id));

        store
            .mark_paid(order.id, Money::new(Decimal::from(33)), None)
            .await
            .unwrap();
        assert!(
            store
                .find_pending_by_cart_hash("abc", since)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_update_fulfillment_is_conditional() {
        let store = MemoryStore::new();
        let order = OrderStore::create(&store, new_order("h")).await.unwrap();

        let moved = store
            .update_fulfillment(
                order.id,
                FulfillmentStatus::Created,
                FulfillmentStatus::Processing,
                None,
            )
            .await
            .unwrap();
        let stale = store
            .update_fulfillment(
                order.id,
                FulfillmentStatus::Created,
                FulfillmentStatus::Processing,
                None,
            )
            .await
            .unwrap();

        assert!(moved);
        assert!(!stale);
    }

    #[tokio::test]
    async fn test_webhook_ledger_records_once() {
        let store = MemoryStore::new();
        assert!(!store.is_processed("evt_1").await.unwrap());

        store.record("evt_1", "checkout.session.completed").await.unwrap();
        store.record("evt_1", "checkout.session.completed").await.unwrap();

        assert!(store.is_processed("evt_1").await.unwrap());
        assert_eq!(store.webhook_event_count(), 1);
    }
}
