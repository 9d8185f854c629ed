//! Composite-key cart store.
//!
//! A [`Cart`] holds at most one [`CartLine`] per [`CartKey`]
//! (`product`, `size`, `color`). Adding a line whose key is already present
//! increments that line's quantity instead of creating a second row.
//!
//! The guest cart is a `Cart` serialized into the visitor's session; the
//! server cart applies the same rules in the database. Keeping the rules here
//! means both stores, and any in-memory store used in tests, agree on merge
//! semantics.

use serde::{Deserialize, Serialize};

use crate::pricing;
use crate::types::{Money, ProductId};

/// Upper bound on the quantity of a single line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Errors returned by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// Lines must be added with a quantity of at least one.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
}

/// Identity of a purchasable unit: product plus selected variant options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CartKey {
    /// Build a key, normalizing blank options to `None`.
    ///
    /// `Some("")` and `None` must address the same line, otherwise a form that
    /// submits an empty size would create a duplicate row.
    #[must_use]
    pub fn new(product_id: ProductId, size: Option<String>, color: Option<String>) -> Self {
        Self {
            product_id,
            size: normalize_option(size),
            color: normalize_option(color),
        }
    }
}

fn normalize_option(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// A line in a cart, with a price and display snapshot taken when added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub key: CartKey,
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// An ordered set of cart lines, most recently added first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Lines, most recently added first.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Consume the cart and return its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// Look up a line by key.
    #[must_use]
    pub fn get(&self, key: &CartKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.key == key)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a line, merging into an existing line with the same key.
    ///
    /// A merged line keeps its position; a new key goes to the front.
    /// Quantities saturate at [`MAX_LINE_QUANTITY`]. Merging refreshes the
    /// price and display snapshot from the incoming line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] if `line.quantity` is zero.
    pub fn add(&mut self, line: CartLine) -> Result<(), CartError> {
        if line.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }

        if let Some(existing) = self.lines.iter_mut().find(|l| l.key == line.key) {
            existing.quantity = existing
                .quantity
                .saturating_add(line.quantity)
                .min(MAX_LINE_QUANTITY);
            existing.unit_price = line.unit_price;
            existing.title = line.title;
            existing.slug = line.slug;
            existing.image = line.image;
        } else {
            let mut line = line;
            line.quantity = line.quantity.min(MAX_LINE_QUANTITY);
            self.lines.insert(0, line);
        }
        Ok(())
    }

    /// Set the quantity of an existing line.
    ///
    /// A quantity of zero or below removes the line. Returns `true` if the
    /// cart changed.
    pub fn update(&mut self, key: &CartKey, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(key);
        }

        let quantity = u32::try_from(quantity)
            .unwrap_or(MAX_LINE_QUANTITY)
            .min(MAX_LINE_QUANTITY);

        match self.lines.iter_mut().find(|l| &l.key == key) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns `true` if a line was removed.
    pub fn remove(&mut self, key: &CartKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.key != key);
        self.lines.len() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Merge another cart into this one with [`Cart::add`] semantics.
    ///
    /// Lines are replayed oldest first so that the incoming cart's own
    /// ordering is preserved at the front of this one.
    pub fn merge(&mut self, other: Self) {
        for line in other.lines.into_iter().rev() {
            // Lines inside a cart never have zero quantity.
            let _ = self.add(line);
        }
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        pricing::subtotal(&self.lines)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines.into_iter().rev() {
            let _ = cart.add(line);
        }
        cart
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn key(product: i32, size: &str, color: &str) -> CartKey {
        CartKey::new(
            ProductId::new(product),
            Some(size.to_owned()),
            Some(color.to_owned()),
        )
    }

    fn line(key: CartKey, quantity: u32) -> CartLine {
        CartLine {
            title: format!("Tee {}", key.product_id),
            slug: format!("tee-{}", key.product_id),
            image: None,
            unit_price: Money::new(Decimal::from(20)),
            quantity,
            key,
        }
    }

    #[test]
    fn test_add_same_key_sums_quantities() {
        let mut cart = Cart::new();
        let k = key(1, "M", "black");

        for qty in [1, 2, 3] {
            cart.add(line(k.clone(), qty)).unwrap();
        }

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.get(&k).unwrap().quantity, 6);
    }

    #[test]
    fn test_different_variants_are_different_lines() {
        let mut cart = Cart::new();
        cart.add(line(key(1, "M", "black"), 1)).unwrap();
        cart.add(line(key(1, "L", "black"), 1)).unwrap();
        cart.add(line(key(1, "M", "white"), 1)).unwrap();

        assert_eq!(cart.lines().len(), 3);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_blank_options_address_the_same_line() {
        let mut cart = Cart::new();
        let a = CartKey::new(ProductId::new(5), Some("  ".to_owned()), None);
        let b = CartKey::new(ProductId::new(5), None, Some(String::new()));
        assert_eq!(a, b);

        cart.add(line(a, 1)).unwrap();
        cart.add(line(b, 1)).unwrap();
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_listing_is_most_recent_first() {
        let mut cart = Cart::new();
        cart.add(line(key(1, "S", "red"), 1)).unwrap();
        cart.add(line(key(2, "S", "red"), 1)).unwrap();
        cart.add(line(key(3, "S", "red"), 1)).unwrap();
        // merging into an existing key keeps its position
        cart.add(line(key(1, "S", "red"), 1)).unwrap();

        let order: Vec<i32> = cart
            .lines()
            .iter()
            .map(|l| l.key.product_id.as_i32())
            .collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_update_non_positive_removes() {
        for qty in [0, -1] {
            let mut cart = Cart::new();
            let k = key(1, "M", "black");
            cart.add(line(k.clone(), 2)).unwrap();

            assert!(cart.update(&k, qty));
            assert!(cart.get(&k).is_none());
            // idempotent with remove
            assert!(!cart.update(&k, qty));
            assert!(!cart.remove(&k));
        }
    }

    #[test]
    fn test_update_sets_quantity() {
        let mut cart = Cart::new();
        let k = key(1, "M", "black");
        cart.add(line(k.clone(), 2)).unwrap();

        assert!(cart.update(&k, 7));
        assert_eq!(cart.get(&k).unwrap().quantity, 7);
        assert!(!cart.update(&key(9, "M", "black"), 3));
    }

    #[test]
    fn test_quantity_saturates() {
        let mut cart = Cart::new();
        let k = key(1, "M", "black");
        cart.add(line(k.clone(), 90)).unwrap();
        cart.add(line(k.clone(), 90)).unwrap();
        assert_eq!(cart.get(&k).unwrap().quantity, MAX_LINE_QUANTITY);

        cart.update(&k, 5_000);
        assert_eq!(cart.get(&k).unwrap().quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_zero_quantity_add_rejected() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add(line(key(1, "M", "black"), 0)),
            Err(CartError::ZeroQuantity)
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_sums_and_preserves_incoming_order() {
        let mut account = Cart::new();
        account.add(line(key(1, "M", "black"), 1)).unwrap();

        let mut guest = Cart::new();
        guest.add(line(key(2, "M", "black"), 1)).unwrap();
        guest.add(line(key(1, "M", "black"), 2)).unwrap();
        guest.add(line(key(3, "M", "black"), 1)).unwrap();

        account.merge(guest);

        assert_eq!(account.get(&key(1, "M", "black")).unwrap().quantity, 3);
        let order: Vec<i32> = account
            .lines()
            .iter()
            .map(|l| l.key.product_id.as_i32())
            .collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut cart = Cart::new();
        cart.add(line(key(1, "M", "black"), 1)).unwrap();
        cart.clear();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Money::ZERO);
    }

    #[test]
    fn test_session_roundtrip_keeps_order() {
        let mut cart = Cart::new();
        cart.add(line(key(1, "M", "black"), 1)).unwrap();
        cart.add(line(key(2, "L", "white"), 3)).unwrap();

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
    }
}
