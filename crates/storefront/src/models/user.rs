//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use threadline_core::{Email, UserId, UserRole};

/// A storefront user (domain type).
///
/// The password hash never leaves the repository layer; see
/// [`crate::db::UserStore::get_password_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Customer or admin.
    pub role: UserRole,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
