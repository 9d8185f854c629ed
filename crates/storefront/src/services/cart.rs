//! Cart operations over the guest (session) cart and the server cart.
//!
//! A signed-in customer's cart lives in `storefront.cart_item` and is
//! authoritative; a guest's cart is a [`Cart`] serialized into the session.
//! Both follow the same add/update/remove rules from `threadline_core::cart`.
//! On sign-in the guest cart is merged into the server cart and cleared.

use thiserror::Error;
use tower_sessions::Session;

use threadline_core::{Cart, CartKey, CartLine, MAX_LINE_QUANTITY, UserId};

use crate::db::{RepositoryError, Stores};
use crate::models::session_keys;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartServiceError {
    /// Product does not exist or is hidden.
    #[error("product not found")]
    ProductNotFound,

    /// The product does not sell this size/color combination.
    #[error("variant not available")]
    VariantUnavailable,

    /// Quantity outside `1..=MAX_LINE_QUANTITY`.
    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Whose cart an operation addresses.
#[derive(Clone, Copy)]
pub enum CartOwner<'s> {
    Guest(&'s Session),
    User(UserId),
}

/// Cart service.
pub struct CartService<'a> {
    stores: &'a Stores,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Build a cart line with a fresh price and display snapshot from the
    /// catalog.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` for unknown or hidden products,
    /// `VariantUnavailable` for a size/color the product does not offer, and
    /// `InvalidQuantity` for a quantity outside `1..=MAX_LINE_QUANTITY`.
    pub async fn snapshot_line(
        &self,
        key: CartKey,
        quantity: i64,
    ) -> Result<CartLine, CartServiceError> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| (1..=MAX_LINE_QUANTITY).contains(q))
            .ok_or(CartServiceError::InvalidQuantity)?;

        let product = self
            .stores
            .products
            .get(key.product_id)
            .await?
            .filter(crate::models::Product::is_active)
            .ok_or(CartServiceError::ProductNotFound)?;

        if !product.offers(&key) {
            return Err(CartServiceError::VariantUnavailable);
        }

        Ok(CartLine {
            title: product.title.clone(),
            slug: product.slug.clone(),
            image: product.primary_image().map(str::to_owned),
            unit_price: product.price,
            quantity,
            key,
        })
    }

    /// The owner's current cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or session cannot be read.
    pub async fn get(&self, owner: CartOwner<'_>) -> Result<Cart, CartServiceError> {
        match owner {
            CartOwner::Guest(session) => load_guest_cart(session).await,
            CartOwner::User(user_id) => Ok(self.stores.carts.get(user_id).await?),
        }
    }

    /// Add a product to the cart, summing with an existing line.
    ///
    /// # Errors
    ///
    /// See [`Self::snapshot_line`].
    #[tracing::instrument(skip(self, owner, key), fields(product_id = %key.product_id))]
    pub async fn add(
        &self,
        owner: CartOwner<'_>,
        key: CartKey,
        quantity: i64,
    ) -> Result<Cart, CartServiceError> {
        let line = self.snapshot_line(key, quantity).await?;

        match owner {
            CartOwner::Guest(session) => {
                let mut cart = load_guest_cart(session).await?;
                cart.add(line)
                    .map_err(|_| CartServiceError::InvalidQuantity)?;
                save_guest_cart(session, &cart).await?;
                Ok(cart)
            }
            CartOwner::User(user_id) => {
                self.stores.carts.add(user_id, line).await?;
                Ok(self.stores.carts.get(user_id).await?)
            }
        }
    }

    /// Set a line's quantity; zero or below removes it. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or session cannot be written.
    pub async fn update(
        &self,
        owner: CartOwner<'_>,
        key: &CartKey,
        quantity: i64,
    ) -> Result<Cart, CartServiceError> {
        match owner {
            CartOwner::Guest(session) => {
                let mut cart = load_guest_cart(session).await?;
                if cart.update(key, quantity) {
                    save_guest_cart(session, &cart).await?;
                }
                Ok(cart)
            }
            CartOwner::User(user_id) => {
                self.stores.carts.update(user_id, key, quantity).await?;
                Ok(self.stores.carts.get(user_id).await?)
            }
        }
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or session cannot be written.
    pub async fn remove(
        &self,
        owner: CartOwner<'_>,
        key: &CartKey,
    ) -> Result<Cart, CartServiceError> {
        self.update(owner, key, 0).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or session cannot be written.
    pub async fn clear(&self, owner: CartOwner<'_>) -> Result<(), CartServiceError> {
        match owner {
            CartOwner::Guest(session) => {
                session.remove::<Cart>(session_keys::GUEST_CART).await?;
            }
            CartOwner::User(user_id) => self.stores.carts.clear(user_id).await?,
        }
        Ok(())
    }

    /// Move the session's guest cart into a user's server cart.
    ///
    /// Quantities for matching keys are summed. The guest cart is removed
    /// from the session only after the merge is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or session cannot be accessed.
    pub async fn merge_guest_cart(
        &self,
        session: &Session,
        user_id: UserId,
    ) -> Result<(), CartServiceError> {
        let guest = load_guest_cart(session).await?;
        if guest.is_empty() {
            return Ok(());
        }

        let lines = guest.lines().len();
        self.stores.carts.merge(user_id, guest).await?;
        session.remove::<Cart>(session_keys::GUEST_CART).await?;

        tracing::info!(user_id = %user_id, lines, "Merged guest cart into account");
        Ok(())
    }
}

async fn load_guest_cart(session: &Session) -> Result<Cart, CartServiceError> {
    Ok(session
        .get::<Cart>(session_keys::GUEST_CART)
        .await?
        .unwrap_or_default())
}

async fn save_guest_cart(session: &Session, cart: &Cart) -> Result<(), CartServiceError> {
    if cart.is_empty() {
        session.remove::<Cart>(session_keys::GUEST_CART).await?;
    } else {
        session.insert(session_keys::GUEST_CART, cart).await?;
    }
    Ok(())
}
