//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and serialize with `camelCase` field names
//! for the JSON API. Input types (`New*`, `*Patch`) derive `Deserialize`.

pub mod collection;
pub mod coupon;
pub mod dashboard;
pub mod order;
pub mod payment;
pub mod product;
pub mod setting;
pub mod user;
pub mod wishlist;

use serde::Serialize;

pub use collection::{Collection, CollectionPatch, CollectionWithCount, NewCollection};
pub use coupon::{
    Coupon, CouponApplication, CouponListFilter, CouponPatch, CouponStats, CouponUsage,
    CouponWithUsage, NewCoupon,
};
pub use dashboard::{DashboardStats, TrendPeriod, TrendPoint};
pub use order::{
    CatalogLine, NewOrder, Order, OrderDetail, OrderDraft, OrderItem, OrderLineInput,
    OrderSummary, OrderTotals, PricedLine, ShippingAddress,
};
pub use payment::{Payment, PaymentInit};
pub use product::{
    NewImage, NewProduct, NewVariant, Product, ProductDetail, ProductFilter, ProductImage,
    ProductListQuery, ProductPatch, ProductSort, ProductSummary, ProductVariant, SortOrder,
};
pub use setting::{Setting, ShippingRates};
pub use user::{CurrentUser, Profile, Session, User};
pub use wishlist::WishlistEntry;

/// Largest page size accepted by list endpoints.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Pagination metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    #[must_use]
    pub const fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }

    /// Row offset for the current page. Saturates for absurd page numbers,
    /// which then simply return no rows.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// A page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Clamp raw `page`/`limit` query values into a valid `(page, limit)` pair.
///
/// Pages start at 1; limits fall in `1..=MAX_PAGE_SIZE`.
#[must_use]
pub fn clamp_page(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// Build a URL slug: lowercase ASCII alphanumerics separated by single hyphens.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Royal Kente Cloth"), "royal-kente-cloth");
        assert_eq!(slugify("  Lace -- & Ankara!! "), "lace-ankara");
        assert_eq!(slugify("KNT-001"), "knt-001");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(clamp_page(Some(0), Some(500)), (1, MAX_PAGE_SIZE));
        assert_eq!(clamp_page(Some(3), Some(0)), (3, 1));
    }

    #[test]
    fn test_pagination() {
        let p = Pagination::new(2, 20, 41);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset(), 20);

        let empty = Pagination::new(1, 20, 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_huge_page_offset_saturates() {
        let (page, limit) = clamp_page(Some(i64::MAX), Some(20));
        let p = Pagination::new(page, limit, 41);
        assert_eq!(p.offset(), i64::MAX);
        assert_eq!(p.total_pages, 3);
    }
}
