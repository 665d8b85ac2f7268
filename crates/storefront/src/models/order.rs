//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agape_core::{
    CouponId, OrderId, OrderItemId, OrderPaymentStatus, OrderStatus, ProductId, UserId, VariantId,
};

/// Most line items accepted on a single order.
pub const MAX_ORDER_LINES: usize = 50;

/// Largest quantity accepted on a single line.
pub const MAX_LINE_QUANTITY: i32 = 100;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    /// Delivery fee waived by a free-shipping coupon.
    pub shipping_discount: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub coupon_id: Option<CouponId>,
    pub shipping_address: Value,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// An order with its line items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// An order row for listings, with its item count and customer email.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
    pub customer_email: Option<String>,
}

/// Product (and optional variant) data needed to price a checkout line.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogLine {
    pub product_id: ProductId,
    pub title: String,
    pub sku: String,
    pub price: Decimal,
    pub inventory: i32,
    pub is_active: bool,
    pub variant_id: Option<VariantId>,
    pub variant_name: Option<String>,
    pub variant_sku: Option<String>,
    pub price_delta: Option<Decimal>,
    pub variant_stock: Option<i32>,
}

/// A checkout line priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub shipping_discount: Decimal,
    pub total: Decimal,
}

/// Everything needed to insert an order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_number: String,
    pub user_id: UserId,
    pub totals: OrderTotals,
    pub currency: String,
    pub coupon_id: Option<CouponId>,
    pub shipping_address: Value,
    pub metadata: Value,
    pub lines: Vec<PricedLine>,
}

// =============================================================================
// Input Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    #[serde(default = "default_country")]
    pub country: String,
    pub postal_code: Option<String>,
}

fn default_country() -> String {
    "Ghana".to_string()
}

impl ShippingAddress {
    /// # Errors
    ///
    /// Returns a message naming the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("fullName", &self.full_name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(format!("Shipping address {name} is required"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineInput {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
}

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(default)]
    pub items: Vec<OrderLineInput>,
    pub shipping_address: ShippingAddress,
    pub coupon_code: Option<String>,
    pub metadata: Option<Value>,
}

impl NewOrder {
    /// # Errors
    ///
    /// Returns a human-readable message for the first failing rule.
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("Order must contain at least one item".to_string());
        }
        if self.items.len() > MAX_ORDER_LINES {
            return Err(format!(
                "Order may contain at most {MAX_ORDER_LINES} items"
            ));
        }
        if self
            .items
            .iter()
            .any(|i| !(1..=MAX_LINE_QUANTITY).contains(&i.quantity))
        {
            return Err(format!(
                "Quantity must be between 1 and {MAX_LINE_QUANTITY}"
            ));
        }
        self.shipping_address.validate()
    }

    /// Trimmed coupon code, if one was supplied.
    #[must_use]
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(json: &str) -> NewOrder {
        serde_json::from_str(json).unwrap()
    }

    const ADDRESS: &str = r#"{"fullName": "Ama Mensah", "phone": "0240000000",
        "address": "12 Oxford St", "city": "Accra", "state": "Greater Accra"}"#;

    #[test]
    fn test_empty_items_rejected() {
        let o = order(&format!(r#"{{"items": [], "shippingAddress": {ADDRESS}}}"#));
        assert_eq!(
            o.validate().unwrap_err(),
            "Order must contain at least one item"
        );
    }

    #[test]
    fn test_quantity_bounds() {
        let o = order(&format!(
            r#"{{"items": [{{"productId": 1, "quantity": 0}}], "shippingAddress": {ADDRESS}}}"#
        ));
        assert!(o.validate().is_err());
    }

    #[test]
    fn test_valid_order_defaults_country() {
        let o = order(&format!(
            r#"{{"items": [{{"productId": 1, "quantity": 2}}], "shippingAddress": {ADDRESS},
                "couponCode": "  "}}"#
        ));
        assert!(o.validate().is_ok());
        assert_eq!(o.shipping_address.country, "Ghana");
        assert_eq!(o.coupon_code(), None);
    }

    #[test]
    fn test_missing_address_field() {
        let mut o = order(&format!(
            r#"{{"items": [{{"productId": 1, "quantity": 1}}], "shippingAddress": {ADDRESS}}}"#
        ));
        o.shipping_address.city = " ".to_string();
        assert_eq!(
            o.validate().unwrap_err(),
            "Shipping address city is required"
        );
    }
}
