//! Checkout and order management.
//!
//! Prices always come from the catalog. Pricing and totals are plain
//! functions; [`OrderService::create`] gathers catalog rows, prices them, and
//! hands a finished draft to the repository, which inserts it and takes stock
//! in one transaction.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

use agape_core::{CurrencyCode, OrderId, OrderStatus, UserId, round_money};

use super::coupons::{CouponError, CouponService};
use crate::db::{OrderRepository, RepositoryError, SettingsRepository};
use crate::models::coupon::CouponApplication;
use crate::models::order::{
    CatalogLine, NewOrder, Order, OrderDetail, OrderDraft, OrderSummary, OrderTotals, PricedLine,
};
use crate::models::setting::ShippingRates;
use crate::models::user::CurrentUser;
use crate::models::{Paginated, Pagination, clamp_page};

const ORDER_NUMBER_PREFIX: &str = "AGP";
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_NUMBER_SUFFIX_LEN: usize = 6;

/// Errors from checkout and order operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Invalid(String),

    #[error("Order not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CheckoutError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

/// Price one requested line against the catalog.
///
/// # Errors
///
/// Returns `CheckoutError::Invalid` for inactive products and
/// `CheckoutError::Conflict` when stock is short.
pub fn price_line(line: &CatalogLine, quantity: i32) -> Result<PricedLine, CheckoutError> {
    if !line.is_active {
        return Err(CheckoutError::Invalid(format!(
            "{} is no longer available",
            line.title
        )));
    }

    let (title, sku, unit_price, available) = match line.variant_id {
        Some(_) => (
            match &line.variant_name {
                Some(name) => format!("{} - {name}", line.title),
                None => line.title.clone(),
            },
            line.variant_sku.clone().unwrap_or_else(|| line.sku.clone()),
            line.price + line.price_delta.unwrap_or_default(),
            line.variant_stock.unwrap_or(0),
        ),
        None => (line.title.clone(), line.sku.clone(), line.price, line.inventory),
    };

    if quantity > available {
        return Err(CheckoutError::Conflict(format!(
            "Insufficient stock for {title} ({available} available)"
        )));
    }

    let unit_price = round_money(unit_price.max(Decimal::ZERO));
    Ok(PricedLine {
        product_id: line.product_id,
        variant_id: line.variant_id,
        title,
        sku,
        unit_price,
        quantity,
        line_total: round_money(unit_price * Decimal::from(quantity)),
    })
}

/// Sum of line totals.
#[must_use]
pub fn subtotal(lines: &[PricedLine]) -> Decimal {
    round_money(lines.iter().map(|l| l.line_total).sum())
}

/// Final money breakdown.
///
/// `shipping` is what the customer pays for delivery after any free-shipping
/// coupon; `shipping_discount` is what the coupon waived.
#[must_use]
pub fn compute_totals(
    subtotal: Decimal,
    rates: &ShippingRates,
    coupon: Option<&CouponApplication>,
) -> OrderTotals {
    let shipping_fee = rates.shipping_for(subtotal);
    let discount = coupon.map_or(Decimal::ZERO, |c| c.discount.min(subtotal));
    let shipping_discount = coupon.map_or(Decimal::ZERO, |c| c.shipping_discount.min(shipping_fee));
    let shipping = shipping_fee - shipping_discount;

    OrderTotals {
        subtotal,
        discount,
        shipping,
        shipping_discount,
        total: round_money((subtotal - discount + shipping).max(Decimal::ZERO)),
    }
}

/// `AGP-YYYYMMDD-XXXXXX`, with a random suffix from an unambiguous alphabet.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_NUMBER_SUFFIX_LEN)
        .filter_map(|_| ORDER_NUMBER_CHARSET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect();
    format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", now.format("%Y%m%d"))
}

pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
    settings: SettingsRepository<'a>,
    coupons: CouponService<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            settings: SettingsRepository::new(pool),
            coupons: CouponService::new(pool),
        }
    }

    /// Place an order for the caller.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Invalid` for bad input or unavailable products,
    /// `CheckoutError::Conflict` when stock runs out, and
    /// `CheckoutError::Coupon` when the coupon is rejected.
    pub async fn create(
        &self,
        user: &CurrentUser,
        input: &NewOrder,
        currency: CurrencyCode,
    ) -> Result<OrderDetail, CheckoutError> {
        input.validate().map_err(CheckoutError::Invalid)?;

        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let catalog = self
                .orders
                .catalog_line(item.product_id, item.variant_id)
                .await?
                .ok_or_else(|| {
                    CheckoutError::Invalid(format!("Product {} not found", item.product_id))
                })?;
            lines.push(price_line(&catalog, item.quantity)?);
        }

        let subtotal = subtotal(&lines);
        let rates = self.settings.shipping_rates().await?;

        let coupon = match input.coupon_code() {
            Some(code) => Some(
                self.coupons
                    .apply(code, subtotal, rates.shipping_for(subtotal), Some(user.id))
                    .await?,
            ),
            None => None,
        };
        let totals = compute_totals(subtotal, &rates, coupon.as_ref());

        let shipping_address = serde_json::to_value(&input.shipping_address)
            .map_err(|e| CheckoutError::Invalid(e.to_string()))?;
        let mut metadata = input.metadata.clone().unwrap_or_else(|| json!({}));
        if let (Some(applied), Some(map)) = (&coupon, metadata.as_object_mut()) {
            map.insert("couponCode".to_owned(), json!(applied.code));
            map.insert("freeShipping".to_owned(), json!(applied.free_shipping));
        }

        let draft = OrderDraft {
            order_number: generate_order_number(Utc::now()),
            user_id: user.id,
            totals,
            currency: currency.code().to_owned(),
            coupon_id: coupon.as_ref().map(|c| c.coupon_id),
            shipping_address,
            metadata,
            lines,
        };

        let order = self.orders.create(&draft).await?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order placed"
        );

        let items = self.orders.items(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the query fails.
    pub async fn list_mine(
        &self,
        user_id: UserId,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Paginated<OrderSummary>, CheckoutError> {
        self.list(Some(user_id), None, page, limit).await
    }

    /// All orders, optionally by status (admin).
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Paginated<OrderSummary>, CheckoutError> {
        self.list(None, status, page, limit).await
    }

    /// An order with its items. Customers only see their own orders.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotFound` if the order is missing or not visible.
    pub async fn get(&self, user: &CurrentUser, id: OrderId) -> Result<OrderDetail, CheckoutError> {
        let order = self
            .orders
            .get(id)
            .await?
            .filter(|o| user.is_admin() || o.user_id == user.id)
            .ok_or(CheckoutError::NotFound)?;
        let items = self.orders.items(id).await?;
        Ok(OrderDetail { order, items })
    }

    /// Cancel one of the caller's pending orders.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotFound` for unknown or foreign orders and
    /// `CheckoutError::Invalid` when the order is past `pending`.
    pub async fn cancel(&self, user_id: UserId, id: OrderId) -> Result<Order, CheckoutError> {
        let order = self.orders.cancel(id, user_id).await.map_err(|e| match e {
            RepositoryError::Conflict(msg) => CheckoutError::Invalid(msg),
            other => other.into(),
        })?;
        tracing::info!(order_id = %id, "Order cancelled by customer");
        Ok(order)
    }

    /// Move an order to a new status (admin).
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotFound` for unknown orders and
    /// `CheckoutError::Invalid` for transitions outside the lifecycle.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, CheckoutError> {
        let current = self.orders.get(id).await?.ok_or(CheckoutError::NotFound)?;
        if !current.status.can_transition_to(next) {
            return Err(CheckoutError::Invalid(format!(
                "Cannot change order status from {} to {next}",
                current.status
            )));
        }

        let order = self.orders.transition(id, next).await.map_err(|e| match e {
            RepositoryError::Conflict(msg) => CheckoutError::Invalid(msg),
            other => other.into(),
        })?;
        tracing::info!(order_id = %id, from = %current.status, to = %next, "Order status changed");
        Ok(order)
    }

    async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Paginated<OrderSummary>, CheckoutError> {
        let (page, limit) = clamp_page(page, limit);
        let offset = Pagination::new(page, limit, 0).offset();
        let (items, total) = self.orders.list(user_id, status, limit, offset).await?;
        Ok(Paginated {
            items,
            pagination: Pagination::new(page, limit, total),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use agape_core::{CouponId, CouponType, ProductId, VariantId};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn catalog(price: &str, inventory: i32) -> CatalogLine {
        CatalogLine {
            product_id: ProductId::new(1),
            title: "Kente Stole".to_string(),
            sku: "KNT-001".to_string(),
            price: dec(price),
            inventory,
            is_active: true,
            variant_id: None,
            variant_name: None,
            variant_sku: None,
            price_delta: None,
            variant_stock: None,
        }
    }

    fn free_shipping() -> CouponApplication {
        CouponApplication {
            coupon_id: CouponId::new(9),
            code: "SHIPFREE".to_string(),
            coupon_type: CouponType::FreeShipping,
            discount: Decimal::ZERO,
            shipping_discount: dec("50"),
            free_shipping: true,
            description: None,
        }
    }

    #[test]
    fn test_price_line_uses_catalog_price() {
        let line = price_line(&catalog("120.50", 10), 3).unwrap();
        assert_eq!(line.unit_price, dec("120.50"));
        assert_eq!(line.line_total, dec("361.50"));
        assert_eq!(line.sku, "KNT-001");
    }

    #[test]
    fn test_price_line_variant_delta_and_stock() {
        let mut c = catalog("100", 0);
        c.variant_id = Some(VariantId::new(4));
        c.variant_name = Some("6 yards".to_string());
        c.variant_sku = Some("KNT-001-6Y".to_string());
        c.price_delta = Some(dec("25"));
        c.variant_stock = Some(2);

        let line = price_line(&c, 2).unwrap();
        assert_eq!(line.unit_price, dec("125"));
        assert_eq!(line.title, "Kente Stole - 6 yards");
        assert_eq!(line.sku, "KNT-001-6Y");

        assert!(matches!(price_line(&c, 3), Err(CheckoutError::Conflict(_))));
    }

    #[test]
    fn test_price_line_rejects_inactive_and_short_stock() {
        let mut c = catalog("100", 1);
        assert!(matches!(price_line(&c, 2), Err(CheckoutError::Conflict(_))));
        c.is_active = false;
        assert!(matches!(price_line(&c, 1), Err(CheckoutError::Invalid(_))));
    }

    #[test]
    fn test_totals_with_delivery_fee() {
        let totals = compute_totals(dec("200"), &ShippingRates::default(), None);
        assert_eq!(totals.shipping, dec("50"));
        assert_eq!(totals.total, dec("250"));
    }

    #[test]
    fn test_totals_free_above_threshold() {
        let totals = compute_totals(dec("500.01"), &ShippingRates::default(), None);
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec("500.01"));
    }

    #[test]
    fn test_totals_with_free_shipping_coupon() {
        let totals = compute_totals(dec("120"), &ShippingRates::default(), Some(&free_shipping()));
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.shipping_discount, dec("50"));
        assert_eq!(totals.total, dec("120"));
    }

    #[test]
    fn test_free_shipping_coupon_above_threshold_waives_nothing() {
        let totals = compute_totals(dec("600"), &ShippingRates::default(), Some(&free_shipping()));
        assert_eq!(totals.shipping_discount, Decimal::ZERO);
        assert_eq!(totals.total, dec("600"));
    }

    #[test]
    fn test_totals_with_discount() {
        let mut coupon = free_shipping();
        coupon.coupon_type = CouponType::Fixed;
        coupon.discount = dec("30");
        coupon.shipping_discount = Decimal::ZERO;
        coupon.free_shipping = false;

        let totals = compute_totals(dec("100"), &ShippingRates::default(), Some(&coupon));
        assert_eq!(totals.total, dec("120"));
    }

    #[test]
    fn test_order_number_format() {
        let now = "2026-03-14T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let number = generate_order_number(now);
        assert!(number.starts_with("AGP-20260314-"), "{number}");
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| ORDER_NUMBER_CHARSET.contains(&b)));
    }
}
