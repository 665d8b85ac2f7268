//! Product repository.
//!
//! Public reads always filter on `is_active`; soft-deleted products are only
//! visible through the `include_inactive` lookups used by admin routes.

use serde_json::{Value, json};
use sqlx::{PgPool, Postgres, QueryBuilder};

use agape_core::{CollectionId, ProductId, UserId};

use super::{AuditRepository, RepositoryError};
use crate::models::product::{
    NewProduct, Product, ProductFilter, ProductImage, ProductPatch, ProductSummary,
    ProductVariant,
};

const PRODUCT_COLUMNS: &str = "p.id, p.sku, p.title, p.slug, p.description, \
    p.short_description, p.price, p.currency, p.weight, p.dimensions, p.tags, p.inventory, \
    p.collection_id, p.is_active, p.metadata, p.created_at, p.updated_at";

const ACTIVE_FROM: &str = "FROM agape.product p \
    LEFT JOIN agape.collection c ON c.id = p.collection_id WHERE p.is_active";

const SUMMARY_EXTRAS: &str = "c.name AS collection_name, \
    (SELECT url FROM agape.product_image WHERE product_id = p.id \
     ORDER BY position LIMIT 1) AS thumbnail";

/// Product lookup key: numeric id or slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductKey {
    Id(ProductId),
    Slug(String),
}

impl ProductKey {
    /// Numeric strings are ids; anything else is a slug.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        value
            .parse::<ProductId>()
            .map_or_else(|_| Self::Slug(value.trim().to_lowercase()), Self::Id)
    }
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        key: &ProductKey,
        include_inactive: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM agape.product p WHERE "
        ));
        match key {
            ProductKey::Id(id) => qb.push("p.id = ").push_bind(*id),
            ProductKey::Slug(slug) => qb.push("p.slug = ").push_bind(slug.clone()),
        };
        if !include_inactive {
            qb.push(" AND p.is_active");
        }

        let product = qb
            .build_query_as::<Product>()
            .fetch_optional(self.pool)
            .await?;

        Ok(product)
    }

    /// Variants of a product, by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants(&self, id: ProductId) -> Result<Vec<ProductVariant>, RepositoryError> {
        let variants = sqlx::query_as::<_, ProductVariant>(
            "SELECT id, product_id, variant_name, sku, price_delta, stock, metadata
             FROM agape.product_variant WHERE product_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(variants)
    }

    /// Images of a product in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn images(&self, id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let images = sqlx::query_as::<_, ProductImage>(
            "SELECT id, product_id, url, alt_text, position
             FROM agape.product_image WHERE product_id = $1 ORDER BY position, id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(images)
    }

    /// List active products matching the filters, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<ProductSummary>, i64), RepositoryError> {
        let total: i64 = count_query(filter)
            .build_query_scalar()
            .fetch_one(self.pool)
            .await?;

        let mut qb = listing_query(filter);
        let items = qb
            .build_query_as::<ProductSummary>()
            .fetch_all(self.pool)
            .await?;

        Ok((items, total))
    }

    /// Full-text search over active products, best matches first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProductSummary>, i64), RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM agape.product p
             WHERE p.is_active AND p.search_vector @@ plainto_tsquery('english', $1)",
        )
        .bind(query)
        .fetch_one(self.pool)
        .await?;

        let items = sqlx::query_as::<_, ProductSummary>(&format!(
            "SELECT {PRODUCT_COLUMNS}, {SUMMARY_EXTRAS}
             FROM agape.product p
             LEFT JOIN agape.collection c ON c.id = p.collection_id,
                  plainto_tsquery('english', $1) query
             WHERE p.is_active AND p.search_vector @@ query
             ORDER BY ts_rank(p.search_vector, query) DESC, p.created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(query)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((items, total))
    }

    /// Insert a product with its variants and images, plus an audit row, in
    /// one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a duplicate SKU or slug.
    pub async fn create(
        &self,
        input: &NewProduct,
        slug: &str,
        actor: Option<UserId>,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO agape.product AS p (sku, title, slug, description, short_description,
                price, currency, weight, dimensions, tags, inventory, collection_id, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(input.sku.trim())
        .bind(input.title.trim())
        .bind(slug)
        .bind(input.description.as_deref())
        .bind(input.short_description.as_deref())
        .bind(input.price)
        .bind(input.currency.as_deref().unwrap_or("GHS"))
        .bind(input.weight)
        .bind(input.dimensions.as_ref())
        .bind(&input.tags)
        .bind(input.inventory)
        .bind(input.collection_id)
        .bind(input.metadata.clone().unwrap_or_else(|| json!({})))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "product SKU or slug already exists"))?;

        for variant in &input.variants {
            sqlx::query(
                "INSERT INTO agape.product_variant
                    (product_id, variant_name, sku, price_delta, stock, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(product.id)
            .bind(variant.variant_name.trim())
            .bind(variant.sku.trim())
            .bind(variant.price_delta)
            .bind(variant.stock)
            .bind(variant.metadata.clone().unwrap_or_else(|| json!({})))
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::unique(e, "variant SKU already exists"))?;
        }

        for (index, image) in input.images.iter().enumerate() {
            let position = image
                .position
                .unwrap_or_else(|| i32::try_from(index).unwrap_or(i32::MAX));
            sqlx::query(
                "INSERT INTO agape.product_image (product_id, url, alt_text, position)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(product.id)
            .bind(image.url.trim())
            .bind(image.alt_text.as_deref())
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(actor) = actor {
            AuditRepository::record(
                &mut *tx,
                actor,
                "create",
                "product",
                product.id.as_i32(),
                &json!({ "sku": product.sku, "title": product.title }),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(product)
    }

    /// Apply a partial update and record before/after in the audit log.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` for a duplicate SKU or slug.
    pub async fn update(
        &self,
        id: ProductId,
        patch: &ProductPatch,
        actor: UserId,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let before = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM agape.product p WHERE p.id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE agape.product AS p SET ");
        let mut set = qb.separated(", ");
        if let Some(sku) = &patch.sku {
            set.push("sku = ").push_bind_unseparated(sku.trim().to_owned());
        }
        if let Some(title) = &patch.title {
            set.push("title = ").push_bind_unseparated(title.trim().to_owned());
        }
        if let Some(slug) = &patch.slug {
            set.push("slug = ")
                .push_bind_unseparated(crate::models::slugify(slug));
        }
        if let Some(description) = &patch.description {
            set.push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(short) = &patch.short_description {
            set.push("short_description = ")
                .push_bind_unseparated(short.clone());
        }
        if let Some(price) = patch.price {
            set.push("price = ").push_bind_unseparated(price);
        }
        if let Some(currency) = &patch.currency {
            set.push("currency = ").push_bind_unseparated(currency.clone());
        }
        if let Some(weight) = patch.weight {
            set.push("weight = ").push_bind_unseparated(weight);
        }
        if let Some(dimensions) = &patch.dimensions {
            set.push("dimensions = ").push_bind_unseparated(dimensions.clone());
        }
        if let Some(tags) = &patch.tags {
            set.push("tags = ").push_bind_unseparated(tags.clone());
        }
        if let Some(inventory) = patch.inventory {
            set.push("inventory = ").push_bind_unseparated(inventory);
        }
        if let Some(collection_id) = patch.collection_id {
            set.push("collection_id = ")
                .push_bind_unseparated(collection_id);
        }
        if let Some(is_active) = patch.is_active {
            set.push("is_active = ").push_bind_unseparated(is_active);
        }
        if let Some(metadata) = &patch.metadata {
            set.push("metadata = ").push_bind_unseparated(metadata.clone());
        }
        qb.push(" WHERE p.id = ").push_bind(id);
        qb.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let after = qb
            .build_query_as::<Product>()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::unique(e, "product SKU or slug already exists"))?;

        AuditRepository::record(
            &mut *tx,
            actor,
            "update",
            "product",
            id.as_i32(),
            &json!({ "before": product_snapshot(&before), "after": patch }),
        )
        .await?;

        tx.commit().await?;
        Ok(after)
    }

    /// Soft delete: mark the product inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist or is
    /// already inactive.
    pub async fn soft_delete(
        &self,
        id: ProductId,
        actor: UserId,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE agape.product AS p SET is_active = FALSE
             WHERE p.id = $1 AND p.is_active
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        AuditRepository::record(
            &mut *tx,
            actor,
            "delete",
            "product",
            id.as_i32(),
            &json!({ "sku": product.sku }),
        )
        .await?;

        tx.commit().await?;
        Ok(product)
    }

    /// Whether a product with this SKU exists (active or not).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sku_exists(&self, sku: &str) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM agape.product WHERE sku = $1)",
        )
        .bind(sku.trim())
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}

fn product_snapshot(p: &Product) -> Value {
    json!({
        "sku": p.sku,
        "title": p.title,
        "slug": p.slug,
        "price": p.price,
        "inventory": p.inventory,
        "collectionId": p.collection_id,
        "isActive": p.is_active,
        "tags": p.tags,
    })
}

/// Count of the active products matching `filter`.
fn count_query(filter: &ProductFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) {ACTIVE_FROM}"));
    push_filters(&mut qb, filter);
    qb
}

/// One sorted page of the active products matching `filter`.
fn listing_query(filter: &ProductFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {PRODUCT_COLUMNS}, {SUMMARY_EXTRAS} {ACTIVE_FROM}"
    ));
    push_filters(&mut qb, filter);
    qb.push(format!(
        " ORDER BY {} {}, p.id {}",
        filter.sort.column(),
        filter.order.sql(),
        filter.order.sql()
    ));
    qb.push(" LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.pagination(0).offset());
    qb
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if let Some(collection) = &filter.collection {
        match collection.parse::<CollectionId>() {
            Ok(id) => qb.push(" AND p.collection_id = ").push_bind(id),
            Err(_) => qb.push(" AND c.slug = ").push_bind(collection.clone()),
        };
    }
    if let Some(search) = &filter.search {
        qb.push(" AND (p.search_vector @@ plainto_tsquery('english', ")
            .push_bind(search.clone())
            .push(") OR p.title ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)))
            .push(")");
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND p.price <= ").push_bind(max);
    }
    if let Some(featured) = filter.featured {
        qb.push(" AND COALESCE((p.metadata->>'is_featured')::BOOLEAN, FALSE) = ")
            .push_bind(featured);
    }
    if !filter.tags.is_empty() {
        qb.push(" AND p.tags && ").push_bind(filter.tags.clone());
    }
    if !filter.colors.is_empty() {
        qb.push(" AND p.tags && ").push_bind(filter.colors.clone());
    }
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::ProductListQuery;

    #[test]
    fn test_product_key_parse() {
        assert_eq!(ProductKey::parse("42"), ProductKey::Id(ProductId::new(42)));
        assert_eq!(
            ProductKey::parse("Royal-Kente"),
            ProductKey::Slug("royal-kente".to_string())
        );
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_listing_sql_always_filters_active() {
        let filter = ProductFilter::from(ProductListQuery {
            collection: Some("kente-collection".to_string()),
            tags: Some("silk".to_string()),
            featured: Some(true),
            ..Default::default()
        });

        let listing = listing_query(&filter);
        let sql = listing.sql();
        assert!(sql.contains("WHERE p.is_active AND"), "{sql}");
        assert!(sql.contains("c.slug = $1"));
        assert!(sql.contains("metadata->>'is_featured'"));
        assert!(sql.contains("p.tags && $3"));
        assert!(sql.contains("LIMIT $4 OFFSET $5"), "{sql}");

        let count = count_query(&filter);
        assert!(count.sql().starts_with("SELECT COUNT(*) FROM agape.product p"));
        assert!(count.sql().contains("WHERE p.is_active AND c.slug = $1"));
    }

    #[test]
    fn test_unfiltered_listing_still_filters_active() {
        let filter = ProductFilter::from(ProductListQuery::default());
        let listing = listing_query(&filter);
        assert!(listing.sql().contains("WHERE p.is_active ORDER BY p.created_at"), "{}", listing.sql());
        assert!(count_query(&filter).sql().ends_with("WHERE p.is_active"));
    }
}
