//! Status and role enums for various entities.
//!
//! Each enum maps to a `PostgreSQL` enum type in the `agape` schema when the
//! `postgres` feature is enabled, and serializes as `snake_case` on the wire.

use serde::{Deserialize, Serialize};

/// Implements `Display` and `FromStr` for a unit-only enum using its
/// `snake_case` wire names.
macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// The `snake_case` name used in JSON and the database.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// User role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "agape.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shopper: catalog, cart, orders, wishlist.
    #[default]
    Customer,
    /// Store management: products, collections, coupons, settings, orders.
    Admin,
}

string_enum!(UserRole, "user role", {
    Customer => "customer",
    Admin => "admin",
});

/// Order fulfilment lifecycle.
///
/// ```text
/// pending -> paid -> processing -> shipped -> delivered
///    |        |          |
///    +--------+----------+--> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "agape.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Paid => "paid",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether an order in this status may move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Payment state of an order, as shown to customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "agape.order_payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

string_enum!(OrderPaymentStatus, "order payment status", {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});

/// State of a single payment transaction with the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "agape.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Refunded,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Success => "success",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    /// A settled payment is never moved by gateway notifications again.
    /// A failed attempt can still be settled by a later successful charge.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Success | Self::Refunded)
    }
}

/// Coupon discount type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "agape.coupon_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    /// Percentage off the cart subtotal.
    Percentage,
    /// Fixed amount off the cart subtotal.
    Fixed,
    /// Waives the delivery fee.
    FreeShipping,
}

string_enum!(CouponType, "coupon type", {
    Percentage => "percentage",
    Fixed => "fixed",
    FreeShipping => "free_shipping",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_happy_path() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_order_status_rejects_backwards_and_skips() {
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }

    #[test]
    fn test_coupon_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&CouponType::FreeShipping).unwrap(),
            "\"free_shipping\""
        );
        assert_eq!("fixed".parse::<CouponType>().unwrap(), CouponType::Fixed);
        assert!("bogus".parse::<CouponType>().is_err());
    }

    #[test]
    fn test_user_role_roundtrip() {
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!("customer".parse::<UserRole>().unwrap(), UserRole::Customer);
    }

    #[test]
    fn test_payment_status_settled() {
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
        assert!(PaymentStatus::Success.is_settled());
        assert!(PaymentStatus::Refunded.is_settled());
    }
}
