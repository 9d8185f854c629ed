//! Status enums and their transition tables.
//!
//! Payment and fulfillment statuses are explicit state machines. Every
//! mutation goes through [`PaymentStatus::can_transition_to`] or
//! [`FulfillmentStatus::can_transition_to`] rather than writing free-form
//! strings, so an invalid step is rejected in one place.
//!
//! All enums are stored as lowercase text and round-trip through
//! `Display`/`FromStr`.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A requested status change that the transition table does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move {kind} status from {from} to {to}")]
pub struct TransitionError {
    /// Which state machine rejected the change.
    pub kind: &'static str,
    /// Current status.
    pub from: String,
    /// Requested status.
    pub to: String,
}

/// Error returned when parsing a status from text fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Lowercase text form, as stored in the database.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseStatusError {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Payment status of an order.
///
/// ```text
/// pending ──► paid
///    │
///    └──────► canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Canceled,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Canceled => "canceled",
});

impl PaymentStatus {
    /// Whether `self -> next` is an edge in the payment transition table.
    ///
    /// Self-loops are not edges; callers treat a repeated `paid` as an
    /// idempotent re-delivery, not a transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Pending, Self::Paid | Self::Canceled))
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the edge is not in the table.
    pub fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                kind: "payment",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

/// Fulfillment status of an order.
///
/// Steps are strictly ordered and advance one at a time:
///
/// ```text
/// created ──► processing ──► shipped ──► delivered
///    │             │
///    └─────────────┴──► canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Created,
    Processing,
    Shipped,
    Delivered,
    Canceled,
}

text_enum!(FulfillmentStatus, "fulfillment status", {
    Created => "created",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Canceled => "canceled",
});

impl FulfillmentStatus {
    /// The single forward step from this status, if any.
    #[must_use]
    pub const fn next_step(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Processing),
            Self::Processing => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered | Self::Canceled => None,
        }
    }

    /// Whether `self -> next` is an edge in the fulfillment transition table.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match next {
            Self::Canceled => matches!(self, Self::Created | Self::Processing),
            _ => self.next_step() == Some(next),
        }
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the edge is not in the table.
    pub fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                kind: "fulfillment",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled)
    }
}

/// Role of a storefront user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    Customer,
    /// Back-office access to products, orders and users.
    Admin,
}

text_enum!(UserRole, "user role", {
    Customer => "customer",
    Admin => "admin",
});

/// Catalog visibility of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Listed in the storefront.
    #[default]
    Active,
    /// Only visible in the admin back-office.
    Hidden,
}

text_enum!(ProductStatus, "product status", {
    Active => "active",
    Hidden => "hidden",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALL_PAYMENT: [PaymentStatus; 3] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Canceled,
    ];

    const ALL_FULFILLMENT: [FulfillmentStatus; 5] = [
        FulfillmentStatus::Created,
        FulfillmentStatus::Processing,
        FulfillmentStatus::Shipped,
        FulfillmentStatus::Delivered,
        FulfillmentStatus::Canceled,
    ];

    #[test]
    fn test_payment_table_only_leaves_pending() {
        let allowed: Vec<_> = ALL_PAYMENT
            .iter()
            .flat_map(|from| ALL_PAYMENT.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            allowed,
            vec![
                (PaymentStatus::Pending, PaymentStatus::Paid),
                (PaymentStatus::Pending, PaymentStatus::Canceled),
            ]
        );
    }

    #[test]
    fn test_payment_transition_error_message() {
        let err = PaymentStatus::Canceled
            .transition(PaymentStatus::Paid)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot move payment status from canceled to paid");
    }

    #[test]
    fn test_fulfillment_steps_are_strictly_ordered() {
        use FulfillmentStatus::*;

        assert!(Created.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Created.can_transition_to(Shipped));
        assert!(!Created.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Delivered.can_transition_to(Created));
    }

    #[test]
    fn test_fulfillment_cancel_only_before_shipping() {
        use FulfillmentStatus::*;

        assert!(Created.can_transition_to(Canceled));
        assert!(Processing.can_transition_to(Canceled));
        assert!(!Shipped.can_transition_to(Canceled));
        assert!(!Delivered.can_transition_to(Canceled));
        assert!(!Canceled.can_transition_to(Canceled));
    }

    #[test]
    fn test_terminal_states_have_no_edges() {
        for from in ALL_FULFILLMENT.iter().filter(|s| s.is_terminal()) {
            for to in ALL_FULFILLMENT {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_text_roundtrip() {
        for status in ALL_FULFILLMENT {
            assert_eq!(status.as_str().parse::<FulfillmentStatus>().unwrap(), status);
        }
        for status in ALL_PAYMENT {
            assert_eq!(status.to_string().parse::<PaymentStatus>().unwrap(), status);
        }
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("Admin".parse::<UserRole>().is_err());
        assert!("archived".parse::<ProductStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_text_form() {
        let json = serde_json::to_string(&FulfillmentStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
