//! Products and collections, with read-through caching.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use agape_core::{CollectionId, ProductId, UserId};

use super::cache::{CacheKey, CatalogCache};
use crate::db::products::ProductKey;
use crate::db::{CollectionRepository, ProductRepository, RepositoryError};
use crate::models::collection::{Collection, CollectionPatch, CollectionWithCount, NewCollection};
use crate::models::product::{
    NewProduct, Product, ProductDetail, ProductFilter, ProductPatch, ProductSummary,
};
use crate::models::{Paginated, Pagination, clamp_page};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    collections: CollectionRepository<'a>,
    cache: &'a CatalogCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CatalogCache) -> Self {
        Self {
            products: ProductRepository::new(pool),
            collections: CollectionRepository::new(pool),
            cache,
        }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// A product by numeric id or slug.
    ///
    /// Inactive products are only returned with `include_inactive`; those
    /// lookups bypass the cache.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no matching product is visible.
    pub async fn product(
        &self,
        id_or_slug: &str,
        include_inactive: bool,
    ) -> Result<Arc<ProductDetail>, CatalogError> {
        let key = ProductKey::parse(id_or_slug);
        let cache_key = match &key {
            ProductKey::Id(id) => CacheKey::ProductById(*id),
            ProductKey::Slug(slug) => CacheKey::ProductBySlug(slug.clone()),
        };

        if !include_inactive && let Some(hit) = self.cache.product(&cache_key).await {
            return Ok(hit);
        }

        let product = self
            .products
            .get(&key, include_inactive)
            .await?
            .ok_or(CatalogError::NotFound("Product"))?;
        let detail = self.load_detail(product).await?;

        if detail.product.is_active {
            Ok(self.cache.put_product(detail).await)
        } else {
            Ok(Arc::new(detail))
        }
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Paginated<ProductSummary>, CatalogError> {
        let (items, total) = self.products.list(filter).await?;
        Ok(Paginated {
            items,
            pagination: filter.pagination(total),
        })
    }

    /// Full-text search, best matches first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for a blank query.
    pub async fn search(
        &self,
        query: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Paginated<ProductSummary>, CatalogError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CatalogError::Invalid("Search query is required".to_string()));
        }
        let (page, limit) = clamp_page(page, limit);
        let pagination = Pagination::new(page, limit, 0);

        let (items, total) = self
            .products
            .search(query, limit, pagination.offset())
            .await?;

        Ok(Paginated {
            items,
            pagination: Pagination::new(page, limit, total),
        })
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for bad input or an unknown collection,
    /// and `CatalogError::Conflict` for a duplicate SKU or slug.
    pub async fn create_product(
        &self,
        input: &NewProduct,
        actor: UserId,
    ) -> Result<ProductDetail, CatalogError> {
        input.validate().map_err(CatalogError::Invalid)?;
        let slug = input.resolved_slug();
        if slug.is_empty() {
            return Err(CatalogError::Invalid("Slug cannot be empty".to_string()));
        }
        if let Some(collection_id) = input.collection_id {
            self.require_collection(collection_id).await?;
        }

        let product = self.products.create(input, &slug, Some(actor)).await?;
        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");

        self.cache.invalidate_collections().await;
        self.load_detail(product).await
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for an empty patch or unknown
    /// collection, `CatalogError::NotFound` for an unknown product.
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        actor: UserId,
    ) -> Result<ProductDetail, CatalogError> {
        if patch.is_empty() {
            return Err(CatalogError::Invalid("No fields to update".to_string()));
        }
        if patch.price.is_some_and(|p| p.is_sign_negative()) {
            return Err(CatalogError::Invalid("Price must not be negative".to_string()));
        }
        if patch.inventory.is_some_and(|i| i < 0) {
            return Err(CatalogError::Invalid(
                "Inventory must not be negative".to_string(),
            ));
        }
        if let Some(collection_id) = patch.collection_id {
            self.require_collection(collection_id).await?;
        }

        let before = self
            .products
            .get(&ProductKey::Id(id), true)
            .await?
            .ok_or(CatalogError::NotFound("Product"))?;

        let after = self
            .products
            .update(id, patch, actor)
            .await
            .map_err(|e| not_found_as(e, "Product"))?;
        tracing::info!(product_id = %id, "Product updated");

        self.cache
            .invalidate_product(id, &[before.slug.as_str(), after.slug.as_str()])
            .await;
        self.cache.invalidate_collections().await;
        self.load_detail(after).await
    }

    /// Soft delete.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product doesn't exist or is
    /// already inactive.
    pub async fn delete_product(&self, id: ProductId, actor: UserId) -> Result<(), CatalogError> {
        let product = self
            .products
            .soft_delete(id, actor)
            .await
            .map_err(|e| not_found_as(e, "Product"))?;
        tracing::info!(product_id = %id, "Product deactivated");

        self.cache
            .invalidate_product(id, &[product.slug.as_str()])
            .await;
        self.cache.invalidate_collections().await;
        Ok(())
    }

    async fn load_detail(&self, product: Product) -> Result<ProductDetail, CatalogError> {
        let variants = self.products.variants(product.id).await?;
        let images = self.products.images(product.id).await?;
        let collection = match product.collection_id {
            Some(id) => self.collections.get_by_id(id).await?,
            None => None,
        };

        Ok(ProductDetail {
            product,
            collection,
            variants,
            images,
        })
    }

    async fn require_collection(&self, id: CollectionId) -> Result<(), CatalogError> {
        if self.collections.exists(id).await? {
            Ok(())
        } else {
            Err(CatalogError::Invalid(format!("Collection {id} does not exist")))
        }
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// All collections with product counts, featured first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn collections(&self) -> Result<Arc<Vec<CollectionWithCount>>, CatalogError> {
        if let Some(hit) = self.cache.collections().await {
            return Ok(hit);
        }
        let collections = self.collections.list_with_counts().await?;
        Ok(self.cache.put_collections(collections).await)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no collection has this slug.
    pub async fn collection(&self, slug: &str) -> Result<CollectionWithCount, CatalogError> {
        self.collections
            .get_by_slug(&slug.trim().to_lowercase())
            .await?
            .ok_or(CatalogError::NotFound("Collection"))
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for a blank name and
    /// `CatalogError::Conflict` for a taken slug.
    pub async fn create_collection(
        &self,
        input: &NewCollection,
    ) -> Result<Collection, CatalogError> {
        if input.name.trim().is_empty() {
            return Err(CatalogError::Invalid("Name is required".to_string()));
        }
        let slug = input.resolved_slug();
        if slug.is_empty() {
            return Err(CatalogError::Invalid("Slug cannot be empty".to_string()));
        }

        let collection = self.collections.create(input, &slug).await?;
        tracing::info!(collection_id = %collection.id, slug = %collection.slug, "Collection created");
        self.cache.invalidate_collections().await;
        Ok(collection)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for an empty patch and
    /// `CatalogError::NotFound` for an unknown collection.
    pub async fn update_collection(
        &self,
        id: CollectionId,
        patch: &CollectionPatch,
    ) -> Result<Collection, CatalogError> {
        if patch.is_empty() {
            return Err(CatalogError::Invalid("No fields to update".to_string()));
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CatalogError::Invalid("Name cannot be empty".to_string()));
        }

        let collection = self
            .collections
            .update(id, patch)
            .await
            .map_err(|e| not_found_as(e, "Collection"))?;
        tracing::info!(collection_id = %id, "Collection updated");

        // Product details embed their collection
        self.cache.invalidate_all().await;
        Ok(collection)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown collection.
    pub async fn delete_collection(&self, id: CollectionId) -> Result<(), CatalogError> {
        self.collections
            .delete(id)
            .await
            .map_err(|e| not_found_as(e, "Collection"))?;
        tracing::info!(collection_id = %id, "Collection deleted");
        self.cache.invalidate_all().await;
        Ok(())
    }

    /// Delete every collection, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the delete fails.
    pub async fn delete_all_collections(&self) -> Result<u64, CatalogError> {
        let deleted = self.collections.delete_all().await?;
        tracing::warn!(deleted, "All collections deleted");
        self.cache.invalidate_all().await;
        Ok(deleted)
    }
}

fn not_found_as(err: RepositoryError, entity: &'static str) -> CatalogError {
    match err {
        RepositoryError::NotFound => CatalogError::NotFound(entity),
        other => other.into(),
    }
}
