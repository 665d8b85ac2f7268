//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agape_core::{CollectionId, ImageId, ProductId, VariantId};

use super::collection::Collection;
use super::{Pagination, clamp_page};

/// A product row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub weight: Option<Decimal>,
    pub dimensions: Option<Value>,
    pub tags: Vec<String>,
    pub inventory: i32,
    pub collection_id: Option<CollectionId>,
    pub is_active: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// `metadata.is_featured`, defaulting to false.
    #[must_use]
    pub fn is_featured(&self) -> bool {
        self.metadata
            .get("is_featured")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub variant_name: String,
    pub sku: String,
    pub price_delta: Decimal,
    pub stock: i32,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: ImageId,
    pub product_id: ProductId,
    pub url: String,
    pub alt_text: Option<String>,
    pub position: i32,
}

/// A product as shown in listings: the row plus its collection name and
/// first image.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub product: Product,
    pub collection_name: Option<String>,
    pub thumbnail: Option<String>,
}

/// A product with everything its detail page needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub collection: Option<Collection>,
    pub variants: Vec<ProductVariant>,
    pub images: Vec<ProductImage>,
}

// =============================================================================
// Input Types
// =============================================================================

/// Product creation input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub sku: String,
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Decimal,
    pub currency: Option<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub inventory: i32,
    pub collection_id: Option<CollectionId>,
    pub metadata: Option<Value>,
    #[serde(default)]
    pub variants: Vec<NewVariant>,
    #[serde(default)]
    pub images: Vec<NewImage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVariant {
    pub variant_name: String,
    pub sku: String,
    #[serde(default)]
    pub price_delta: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewImage {
    pub url: String,
    pub alt_text: Option<String>,
    pub position: Option<i32>,
}

impl NewProduct {
    /// Check field-level rules before touching the database.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first failing rule.
    pub fn validate(&self) -> Result<(), String> {
        if self.sku.trim().is_empty() {
            return Err("SKU is required".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if self.price.is_sign_negative() {
            return Err("Price must not be negative".to_string());
        }
        if self.inventory < 0 {
            return Err("Inventory must not be negative".to_string());
        }
        for variant in &self.variants {
            if variant.sku.trim().is_empty() || variant.variant_name.trim().is_empty() {
                return Err("Variants need a name and SKU".to_string());
            }
            if variant.stock < 0 {
                return Err("Variant stock must not be negative".to_string());
            }
        }
        if self.images.iter().any(|i| i.url.trim().is_empty()) {
            return Err("Image URL is required".to_string());
        }
        Ok(())
    }

    /// The explicit slug, or one derived from the title.
    #[must_use]
    pub fn resolved_slug(&self) -> String {
        match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => super::slugify(s),
            _ => super::slugify(&self.title),
        }
    }
}

/// Partial product update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub sku: Option<String>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<Value>,
    pub tags: Option<Vec<String>>,
    pub inventory: Option<i32>,
    pub collection_id: Option<CollectionId>,
    pub is_active: Option<bool>,
    pub metadata: Option<Value>,
}

impl ProductPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sku.is_none()
            && self.title.is_none()
            && self.slug.is_none()
            && self.description.is_none()
            && self.short_description.is_none()
            && self.price.is_none()
            && self.currency.is_none()
            && self.weight.is_none()
            && self.dimensions.is_none()
            && self.tags.is_none()
            && self.inventory.is_none()
            && self.collection_id.is_none()
            && self.is_active.is_none()
            && self.metadata.is_none()
    }
}

// =============================================================================
// Listing Filters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Price,
    Title,
}

impl ProductSort {
    /// Parse a sort key; unknown keys fall back to `created_at`.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("price") => Self::Price,
            Some("title") => Self::Title,
            _ => Self::CreatedAt,
        }
    }

    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "p.created_at",
            Self::Price => "p.price",
            Self::Title => "p.title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse a direction; anything but `asc` sorts descending.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Raw product listing query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    /// Collection id or slug.
    pub collection: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    /// Comma-separated tag list.
    pub tags: Option<String>,
    /// Comma-separated colour list, matched against tags.
    pub colors: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Validated product listing filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    pub collection: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub tags: Vec<String>,
    pub colors: Vec<String>,
    pub page: i64,
    pub limit: i64,
    pub sort: ProductSort,
    pub order: SortOrder,
}

impl From<ProductListQuery> for ProductFilter {
    fn from(q: ProductListQuery) -> Self {
        let (page, limit) = clamp_page(q.page, q.limit);
        Self {
            collection: non_empty(q.collection),
            search: non_empty(q.search),
            min_price: q.min_price,
            max_price: q.max_price,
            featured: q.featured,
            tags: split_list(q.tags.as_deref()),
            colors: split_list(q.colors.as_deref()),
            page,
            limit,
            sort: ProductSort::parse(q.sort_by.as_deref()),
            order: SortOrder::parse(q.sort_order.as_deref()),
        }
    }
}

impl ProductFilter {
    #[must_use]
    pub const fn pagination(&self, total: i64) -> Pagination {
        Pagination::new(self.page, self.limit, total)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults() {
        let filter = ProductFilter::from(ProductListQuery::default());
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 20);
        assert_eq!(filter.sort, ProductSort::CreatedAt);
        assert_eq!(filter.order, SortOrder::Desc);
        assert!(filter.tags.is_empty());
    }

    #[test]
    fn test_filter_unknown_sort_falls_back() {
        let filter = ProductFilter::from(ProductListQuery {
            sort_by: Some("id; DROP TABLE".to_string()),
            sort_order: Some("sideways".to_string()),
            ..Default::default()
        });
        assert_eq!(filter.sort, ProductSort::CreatedAt);
        assert_eq!(filter.order, SortOrder::Desc);
    }

    #[test]
    fn test_filter_parses_lists_and_bounds() {
        let filter = ProductFilter::from(ProductListQuery {
            tags: Some("kente, handwoven,,".to_string()),
            search: Some("   ".to_string()),
            page: Some(-4),
            limit: Some(1000),
            sort_by: Some("price".to_string()),
            sort_order: Some("ASC".to_string()),
            ..Default::default()
        });
        assert_eq!(filter.tags, vec!["kente", "handwoven"]);
        assert_eq!(filter.search, None);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.sort, ProductSort::Price);
        assert_eq!(filter.order, SortOrder::Asc);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(ProductPatch::default().is_empty());
        let patch: ProductPatch = serde_json::from_str(r#"{"price": 120.5}"#).unwrap();
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_new_product_slug_and_validation() {
        let input: NewProduct = serde_json::from_str(
            r#"{"sku": "KNT-009", "title": "Gold Kente Stole", "price": 250}"#,
        )
        .unwrap();
        assert_eq!(input.resolved_slug(), "gold-kente-stole");
        assert!(input.validate().is_ok());

        let bad: NewProduct =
            serde_json::from_str(r#"{"sku": "X", "title": "Y", "price": -1}"#).unwrap();
        assert!(bad.validate().is_err());
    }
}
