//! Coupon types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use agape_core::{CouponId, CouponType, CouponUsageId, OrderId, UserId};

/// Longest description accepted on a coupon.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub amount_or_pct: Decimal,
    pub min_order_amount: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub per_user_limit: i32,
    pub description: Option<String>,
    pub is_active: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A coupon with its redemption totals (admin listing).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CouponWithUsage {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub coupon: Coupon,
    pub total_usage: i64,
    pub total_discount_given: Decimal,
}

/// A single redemption, joined with who used it and on which order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CouponUsage {
    pub id: CouponUsageId,
    pub coupon_id: CouponId,
    pub user_id: Option<UserId>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub order_id: Option<OrderId>,
    pub order_number: Option<String>,
    pub discount_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CouponStats {
    pub total_coupons: i64,
    pub active_coupons: i64,
    pub expired_coupons: i64,
    pub total_redemptions: i64,
    pub total_discount_given: Decimal,
}

/// Outcome of applying a coupon to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponApplication {
    pub coupon_id: CouponId,
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    /// Amount taken off the goods subtotal.
    pub discount: Decimal,
    /// Amount taken off the delivery fee.
    pub shipping_discount: Decimal,
    pub free_shipping: bool,
    pub description: Option<String>,
}

// =============================================================================
// Input Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    #[serde(default)]
    pub amount_or_pct: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl NewCoupon {
    /// Upper-cased, trimmed code.
    #[must_use]
    pub fn normalized_code(&self) -> String {
        self.code.trim().to_uppercase()
    }

    /// Check field-level rules.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first failing rule.
    pub fn validate(&self) -> Result<(), String> {
        let code_len = self.code.trim().chars().count();
        if !(3..=50).contains(&code_len) {
            return Err("Coupon code must be between 3 and 50 characters".to_string());
        }
        if self.amount_or_pct.is_sign_negative() {
            return Err("Amount must be non-negative".to_string());
        }
        if self.coupon_type == CouponType::Percentage && self.amount_or_pct > Decimal::ONE_HUNDRED
        {
            return Err("Percentage must be between 0 and 100".to_string());
        }
        if self.min_order_amount.is_sign_negative() {
            return Err("Minimum order amount must be non-negative".to_string());
        }
        validate_limits(self.usage_limit, self.per_user_limit)?;
        validate_description(self.description.as_deref())
    }
}

/// Partial coupon update. Code, type and amount are fixed once issued.
///
/// `expiresAt` and `usageLimit` accept an explicit `null`, which clears them
/// (`Some(None)`); leaving the field out keeps the current value (`None`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPatch {
    pub description: Option<String>,
    pub min_order_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub usage_limit: Option<Option<i32>>,
    pub per_user_limit: Option<i32>,
    pub is_active: Option<bool>,
}

impl CouponPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.min_order_amount.is_none()
            && self.expires_at.is_none()
            && self.usage_limit.is_none()
            && self.per_user_limit.is_none()
            && self.is_active.is_none()
    }

    /// # Errors
    ///
    /// Returns a human-readable message for the first failing rule.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_order_amount.is_some_and(|m| m.is_sign_negative()) {
            return Err("Minimum order amount must be non-negative".to_string());
        }
        validate_limits(self.usage_limit.flatten(), self.per_user_limit)?;
        validate_description(self.description.as_deref())
    }
}

/// Tell an explicit `null` apart from a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Admin coupon listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponListFilter {
    pub is_active: Option<bool>,
    #[serde(rename = "type")]
    pub coupon_type: Option<CouponType>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl CouponListFilter {
    /// `(limit, offset)` with limit in `1..=100` (default 100) and offset ≥ 0.
    #[must_use]
    pub fn bounds(&self) -> (i64, i64) {
        (
            self.limit.unwrap_or(100).clamp(1, 100),
            self.offset.unwrap_or(0).max(0),
        )
    }
}

fn validate_limits(usage_limit: Option<i32>, per_user_limit: Option<i32>) -> Result<(), String> {
    if usage_limit.is_some_and(|l| l < 1) {
        return Err("Usage limit must be at least 1".to_string());
    }
    if per_user_limit.is_some_and(|l| l < 1) {
        return Err("Per-user limit must be at least 1".to_string());
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), String> {
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LENGTH) {
        return Err(format!(
            "Description must be at most {MAX_DESCRIPTION_LENGTH} characters"
        ));
    }
    Ok(())
}
