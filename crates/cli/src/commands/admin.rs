//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin account
//! tl-cli admin create -e admin@example.com -p 'long passphrase'
//!
//! # Promote an existing account
//! tl-cli admin promote -e someone@example.com
//! ```
//!
//! A role change takes effect the next time the user signs in.

use thiserror::Error;

use threadline_core::{UserId, UserRole};
use threadline_storefront::db::Stores;
use threadline_storefront::services::auth::{AuthError, AuthService};

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("No account with email: {0}")]
    UserNotFound(String),

    #[error("Account already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Auth(AuthError),
}

/// Create a new admin account.
///
/// # Returns
///
/// The ID of the created account.
pub async fn create_user(email: &str, password: &str) -> Result<UserId, AdminError> {
    let stores = Stores::postgres(connect().await?);

    tracing::info!("Creating admin user: {}", email);
    let user = AuthService::new(stores.users.as_ref())
        .create_user(email, password, UserRole::Admin)
        .await
        .map_err(|e| match e {
            AuthError::UserAlreadyExists => AdminError::UserExists(email.to_owned()),
            other => AdminError::Auth(other),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}

/// Give an existing account the admin role.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let stores = Stores::postgres(connect().await?);

    let user = AuthService::new(stores.users.as_ref())
        .promote(email)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => AdminError::UserNotFound(email.to_owned()),
            other => AdminError::Auth(other),
        })?;

    tracing::info!("{} is now an admin (ID: {})", user.email, user.id);
    Ok(())
}
