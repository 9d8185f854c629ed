//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses are JSON: `{"error": "<message>"}`. Validation messages are
//! passed through; server-side failures get a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::admin::AdminError;
use crate::services::auth::AuthError;
use crate::services::cart::CartServiceError;
use crate::services::checkout::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartServiceError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Back-office operation failed.
    #[error("Admin error: {0}")]
    Admin(#[from] AdminError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Cart(err) => match err {
                CartServiceError::ProductNotFound => StatusCode::NOT_FOUND,
                CartServiceError::VariantUnavailable | CartServiceError::InvalidQuantity => {
                    StatusCode::BAD_REQUEST
                }
                CartServiceError::Repository(_) | CartServiceError::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                e if e.is_validation() => StatusCode::BAD_REQUEST,
                CheckoutError::OrderNotFound => StatusCode::NOT_FOUND,
                CheckoutError::Payment(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Admin(err) => match err {
                AdminError::OrderNotFound => StatusCode::NOT_FOUND,
                AdminError::InvalidTransition(_) | AdminError::Conflict => StatusCode::CONFLICT,
                AdminError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Client-facing message. Never includes internal error details.
    fn message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Session(_) => INTERNAL_MESSAGE.to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Invalid credentials".to_string()
                }
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => INTERNAL_MESSAGE.to_string(),
            },
            Self::Cart(err) => match err {
                CartServiceError::Repository(_) | CartServiceError::Session(_) => {
                    INTERNAL_MESSAGE.to_string()
                }
                other => other.to_string(),
            },
            Self::Checkout(err) => match err {
                e if e.is_validation() => e.to_string(),
                CheckoutError::OrderNotFound => "Order not found".to_string(),
                CheckoutError::Payment(_) => {
                    "Payment provider unavailable, please try again".to_string()
                }
                _ => INTERNAL_MESSAGE.to_string(),
            },
            Self::Admin(err) => match err {
                AdminError::Repository(_) => INTERNAL_MESSAGE.to_string(),
                other => other.to_string(),
            },
            Self::NotFound(msg) | Self::BadRequest(msg) | Self::Conflict(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::{FulfillmentStatus, Money};

    use super::*;
    use crate::payments::PaymentError;

    fn status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body(err: AppError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(CartServiceError::VariantUnavailable.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_repository_not_found_and_conflict() {
        assert_eq!(
            status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(RepositoryError::Conflict("slug already exists".into()).into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_checkout_error_status_codes() {
        assert_eq!(
            status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(
                CheckoutError::Pricing(threadline_core::PricingError::NonPositiveSubtotal(
                    Money::ZERO
                ))
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CheckoutError::Payment(PaymentError::Parse("x".into())).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(CheckoutError::OrderNotFound.into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_invalid_fulfillment_transition_is_conflict() {
        let err = FulfillmentStatus::Delivered
            .transition(FulfillmentStatus::Canceled)
            .unwrap_err();
        assert_eq!(
            status(AdminError::InvalidTransition(err).into()),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_validation_message_is_passed_through() {
        let json = body(CheckoutError::EmailRequired.into()).await;
        assert_eq!(json["error"], "email is required");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption(
            "bad row in storefront.order".into(),
        ));
        let json = body(err).await;
        assert_eq!(json["error"], INTERNAL_MESSAGE);

        let json = body(CheckoutError::Payment(PaymentError::Api {
            status: 401,
            message: "Invalid API Key provided: sk_test_...".into(),
        })
        .into())
        .await;
        assert!(!json["error"].as_str().unwrap().contains("sk_test"));
    }
}
