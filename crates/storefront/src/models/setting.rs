//! Store settings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

/// Flat delivery fee.
pub const DELIVERY_FEE: &str = "delivery_fee";

/// Subtotal above which delivery is free.
pub const FREE_SHIPPING_THRESHOLD: &str = "free_shipping_threshold";

/// Delivery fee used when the setting is absent or malformed.
pub const DEFAULT_DELIVERY_FEE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Free-shipping threshold used when the setting is absent or malformed.
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: Value,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Read `value.amount` as a decimal (number or numeric string). Negative
/// amounts are treated as malformed.
#[must_use]
pub fn amount_of(value: &Value) -> Option<Decimal> {
    let amount: Decimal = match value.get("amount")? {
        Value::Number(n) => n.to_string().parse().ok()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (!amount.is_sign_negative()).then_some(amount)
}

/// Delivery pricing inputs read from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingRates {
    pub delivery_fee: Decimal,
    pub free_shipping_threshold: Decimal,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self {
            delivery_fee: DEFAULT_DELIVERY_FEE,
            free_shipping_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD,
        }
    }
}

impl ShippingRates {
    /// Delivery fee for a cart: free when the subtotal is above the threshold.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.delivery_fee
        }
    }
}
