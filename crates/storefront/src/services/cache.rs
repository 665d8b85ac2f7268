//! In-process read-through cache for catalog lookups.
//!
//! Products are cached for 15 minutes and the collection list for an hour.
//! Only public (active) product lookups go through the cache; every catalog
//! write invalidates what it touched.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use agape_core::ProductId;

use crate::models::collection::CollectionWithCount;
use crate::models::product::ProductDetail;

const PRODUCT_TTL: Duration = Duration::from_secs(900);
const COLLECTIONS_TTL: Duration = Duration::from_secs(3600);

/// Cache entry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ProductById(ProductId),
    ProductBySlug(String),
    Collections,
}

/// Catalog caches shared across requests.
#[derive(Clone)]
pub struct CatalogCache {
    products: Cache<CacheKey, Arc<ProductDetail>>,
    collections: Cache<CacheKey, Arc<Vec<CollectionWithCount>>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttls(PRODUCT_TTL, COLLECTIONS_TTL)
    }

    #[must_use]
    pub fn with_ttls(product_ttl: Duration, collections_ttl: Duration) -> Self {
        Self {
            products: Cache::builder()
                .max_capacity(2_000)
                .time_to_live(product_ttl)
                .build(),
            collections: Cache::builder()
                .max_capacity(4)
                .time_to_live(collections_ttl)
                .build(),
        }
    }

    pub async fn product(&self, key: &CacheKey) -> Option<Arc<ProductDetail>> {
        self.products.get(key).await
    }

    /// Cache a product under both its id and slug.
    pub async fn put_product(&self, detail: ProductDetail) -> Arc<ProductDetail> {
        let detail = Arc::new(detail);
        self.products
            .insert(CacheKey::ProductById(detail.product.id), Arc::clone(&detail))
            .await;
        self.products
            .insert(
                CacheKey::ProductBySlug(detail.product.slug.clone()),
                Arc::clone(&detail),
            )
            .await;
        detail
    }

    /// Drop a product's entries. Pass every slug it may be cached under.
    pub async fn invalidate_product(&self, id: ProductId, slugs: &[&str]) {
        self.products.invalidate(&CacheKey::ProductById(id)).await;
        for slug in slugs {
            self.products
                .invalidate(&CacheKey::ProductBySlug((*slug).to_owned()))
                .await;
        }
        tracing::debug!(product_id = %id, "Product cache invalidated");
    }

    pub async fn collections(&self) -> Option<Arc<Vec<CollectionWithCount>>> {
        self.collections.get(&CacheKey::Collections).await
    }

    pub async fn put_collections(
        &self,
        collections: Vec<CollectionWithCount>,
    ) -> Arc<Vec<CollectionWithCount>> {
        let collections = Arc::new(collections);
        self.collections
            .insert(CacheKey::Collections, Arc::clone(&collections))
            .await;
        collections
    }

    pub async fn invalidate_collections(&self) {
        self.collections.invalidate(&CacheKey::Collections).await;
    }

    /// Drop everything, e.g. after a bulk collection delete.
    pub async fn invalidate_all(&self) {
        self.products.invalidate_all();
        self.collections.invalidate_all();
        self.products.run_pending_tasks().await;
        self.collections.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::models::product::Product;

    fn detail(id: i32, slug: &str) -> ProductDetail {
        let now = Utc::now();
        ProductDetail {
            product: Product {
                id: ProductId::new(id),
                sku: format!("KNT-{id:03}"),
                title: "Kente Stole".to_string(),
                slug: slug.to_string(),
                description: None,
                short_description: None,
                price: Decimal::from(120),
                currency: "GHS".to_string(),
                weight: None,
                dimensions: None,
                tags: vec![],
                inventory: 3,
                collection_id: None,
                is_active: true,
                metadata: json!({}),
                created_at: now,
                updated_at: now,
            },
            collection: None,
            variants: vec![],
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_product_cached_by_id_and_slug() {
        let cache = CatalogCache::new();
        cache.put_product(detail(1, "kente-stole")).await;

        let by_id = cache.product(&CacheKey::ProductById(ProductId::new(1))).await;
        let by_slug = cache
            .product(&CacheKey::ProductBySlug("kente-stole".into()))
            .await;
        assert_eq!(by_id.unwrap().product.sku, "KNT-001");
        assert!(by_slug.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_product() {
        let cache = CatalogCache::new();
        cache.put_product(detail(2, "adinkra-wrap")).await;
        cache
            .invalidate_product(ProductId::new(2), &["adinkra-wrap"])
            .await;

        assert!(cache.product(&CacheKey::ProductById(ProductId::new(2))).await.is_none());
        assert!(
            cache
                .product(&CacheKey::ProductBySlug("adinkra-wrap".into()))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_collections_roundtrip_and_invalidate() {
        let cache = CatalogCache::new();
        assert!(cache.collections().await.is_none());
        cache.put_collections(Vec::new()).await;
        assert!(cache.collections().await.is_some());
        cache.invalidate_collections().await;
        assert!(cache.collections().await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache =
            CatalogCache::with_ttls(Duration::from_millis(50), Duration::from_millis(50));
        cache.put_product(detail(3, "batik-throw")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.product(&CacheKey::ProductById(ProductId::new(3))).await.is_none());
    }
}
