//! Wishlist types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use agape_core::{ProductId, VariantId, WishlistItemId};

/// A saved product, joined with the product and variant it points at.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub id: WishlistItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub slug: String,
    pub price: Decimal,
    pub currency: String,
    pub inventory: i32,
    pub is_active: bool,
    pub thumbnail: Option<String>,
    pub variant_name: Option<String>,
    pub price_delta: Option<Decimal>,
}
