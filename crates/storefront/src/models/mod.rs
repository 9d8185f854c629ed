//! Domain models for storefront.
//!
//! These are validated domain types, separate from database row types. Rows
//! are mapped into them by the repositories in [`crate::db`].

pub mod order;
pub mod product;
pub mod session;
pub mod user;

use serde::{Deserialize, Serialize};

pub use order::{NewOrder, Order, OrderFilter, ShippingAddress, TransitionOutcome};
pub use product::{Badge, NewProduct, Product, ProductFilter, ProductUpdate, Variant};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 24;

/// Largest page size a client may request.
pub const MAX_PER_PAGE: u32 = 100;

/// Page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Pagination {
    /// Build a page request from optional query values.
    ///
    /// `page` is at least 1; `per_page` is clamped to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.per_page)
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching rows across all pages.
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Wrap a page of items.
    #[must_use]
    pub const fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(Some(0), Some(1_000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);

        let p = Pagination::new(None, Some(0));
        assert_eq!(p.per_page, 1);
    }

    #[test]
    fn test_pagination_offset() {
        let p = Pagination::new(Some(3), Some(20));
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
        assert_eq!(Pagination::default().offset(), 0);
    }
}
