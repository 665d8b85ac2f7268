//! Coupon rules and administration.
//!
//! [`evaluate`] holds every redemption rule and touches no I/O; the service
//! loads the coupon and the caller's redemption count and hands them to it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use agape_core::{CouponId, CouponType, UserId, round_money};

use crate::db::{CouponRepository, RepositoryError};
use crate::models::coupon::{
    Coupon, CouponApplication, CouponListFilter, CouponPatch, CouponStats, CouponUsage,
    CouponWithUsage, NewCoupon,
};

/// Why a coupon can't be used, or an admin operation failed.
#[derive(Debug, Error)]
pub enum CouponError {
    #[error("Coupon not found")]
    NotFound,

    #[error("This coupon is no longer active")]
    Inactive,

    #[error("This coupon has expired")]
    Expired,

    #[error("Minimum order amount of {0} required to use this coupon")]
    MinimumNotMet(Decimal),

    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,

    #[error("You have already used this coupon the maximum number of times")]
    UserLimitReached,

    #[error("{0}")]
    Invalid(String),

    #[error("Coupon code already exists")]
    DuplicateCode,

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CouponError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(_) => Self::DuplicateCode,
            other => Self::Repository(other),
        }
    }
}

/// Discount split for a coupon type: `(goods discount, shipping discount)`.
///
/// Percentage and fixed discounts never exceed the subtotal. Free shipping
/// waives the whole delivery fee and nothing else.
#[must_use]
pub fn discount_for(
    coupon_type: CouponType,
    amount_or_pct: Decimal,
    subtotal: Decimal,
    shipping_fee: Decimal,
) -> (Decimal, Decimal) {
    let subtotal = subtotal.max(Decimal::ZERO);
    match coupon_type {
        CouponType::Percentage => {
            let pct = amount_or_pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
            let discount = round_money(subtotal * pct / Decimal::ONE_HUNDRED);
            (discount.min(subtotal), Decimal::ZERO)
        }
        CouponType::Fixed => (
            round_money(amount_or_pct.max(Decimal::ZERO).min(subtotal)),
            Decimal::ZERO,
        ),
        CouponType::FreeShipping => (Decimal::ZERO, round_money(shipping_fee.max(Decimal::ZERO))),
    }
}

/// Check a coupon against a cart and compute what it takes off.
///
/// `user_redemptions` is the caller's redemption count, or `None` for an
/// anonymous caller (the per-user limit is then not checked).
///
/// # Errors
///
/// Returns the first failing rule, in order: inactive, expired, minimum order,
/// usage limit, per-user limit.
pub fn evaluate(
    coupon: &Coupon,
    subtotal: Decimal,
    shipping_fee: Decimal,
    now: DateTime<Utc>,
    user_redemptions: Option<i64>,
) -> Result<CouponApplication, CouponError> {
    if !coupon.is_active {
        return Err(CouponError::Inactive);
    }
    if coupon.expires_at.is_some_and(|at| at < now) {
        return Err(CouponError::Expired);
    }
    if subtotal < coupon.min_order_amount {
        return Err(CouponError::MinimumNotMet(coupon.min_order_amount));
    }
    if coupon
        .usage_limit
        .is_some_and(|limit| coupon.used_count >= limit)
    {
        return Err(CouponError::UsageLimitReached);
    }
    if user_redemptions.is_some_and(|used| used >= i64::from(coupon.per_user_limit)) {
        return Err(CouponError::UserLimitReached);
    }

    let (discount, shipping_discount) =
        discount_for(coupon.coupon_type, coupon.amount_or_pct, subtotal, shipping_fee);

    Ok(CouponApplication {
        coupon_id: coupon.id,
        code: coupon.code.clone(),
        coupon_type: coupon.coupon_type,
        discount,
        shipping_discount,
        free_shipping: coupon.coupon_type == CouponType::FreeShipping,
        description: coupon.description.clone(),
    })
}

pub struct CouponService<'a> {
    coupons: CouponRepository<'a>,
}

impl<'a> CouponService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            coupons: CouponRepository::new(pool),
        }
    }

    /// Validate a code against a cart subtotal and delivery fee.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::NotFound` for unknown codes, or the failing rule.
    pub async fn apply(
        &self,
        code: &str,
        subtotal: Decimal,
        shipping_fee: Decimal,
        user_id: Option<UserId>,
    ) -> Result<CouponApplication, CouponError> {
        let coupon = self
            .coupons
            .get_by_code(code)
            .await?
            .ok_or(CouponError::NotFound)?;

        let user_redemptions = match user_id {
            Some(user_id) => Some(self.coupons.user_usage_count(coupon.id, user_id).await?),
            None => None,
        };

        let application = evaluate(&coupon, subtotal, shipping_fee, Utc::now(), user_redemptions)?;
        tracing::debug!(
            coupon_id = %coupon.id,
            discount = %application.discount,
            "Coupon applied"
        );
        Ok(application)
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// # Errors
    ///
    /// Returns `CouponError::Invalid` for bad input and
    /// `CouponError::DuplicateCode` if the code exists.
    pub async fn create(&self, input: &NewCoupon) -> Result<Coupon, CouponError> {
        input.validate().map_err(CouponError::Invalid)?;
        let coupon = self.coupons.create(input).await?;
        tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
        Ok(coupon)
    }

    /// # Errors
    ///
    /// Returns `CouponError::Repository` if the query fails.
    pub async fn list(&self, filter: &CouponListFilter) -> Result<Vec<CouponWithUsage>, CouponError> {
        Ok(self.coupons.list(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `CouponError::Repository` if the query fails.
    pub async fn stats(&self) -> Result<CouponStats, CouponError> {
        Ok(self.coupons.stats().await?)
    }

    /// # Errors
    ///
    /// Returns `CouponError::NotFound` if the coupon doesn't exist.
    pub async fn get(&self, id: CouponId) -> Result<CouponWithUsage, CouponError> {
        self.coupons.get(id).await?.ok_or(CouponError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `CouponError::Invalid` for an empty or invalid patch and
    /// `CouponError::NotFound` if the coupon doesn't exist.
    pub async fn update(&self, id: CouponId, patch: &CouponPatch) -> Result<Coupon, CouponError> {
        if patch.is_empty() {
            return Err(CouponError::Invalid("No valid fields to update".to_string()));
        }
        patch.validate().map_err(CouponError::Invalid)?;
        let coupon = self.coupons.update(id, patch).await?;
        tracing::info!(coupon_id = %id, "Coupon updated");
        Ok(coupon)
    }

    /// # Errors
    ///
    /// Returns `CouponError::NotFound` if the coupon doesn't exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), CouponError> {
        self.coupons.delete(id).await?;
        tracing::info!(coupon_id = %id, "Coupon deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `CouponError::NotFound` if the coupon doesn't exist.
    pub async fn usage_history(
        &self,
        id: CouponId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CouponUsage>, CouponError> {
        if self.coupons.get(id).await?.is_none() {
            return Err(CouponError::NotFound);
        }
        Ok(self
            .coupons
            .usage_history(id, limit.clamp(1, 100), offset.max(0))
            .await?)
    }
}
