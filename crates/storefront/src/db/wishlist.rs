//! Wishlist repository.

use sqlx::PgPool;

use agape_core::{ProductId, UserId, VariantId, WishlistItemId};

use super::RepositoryError;
use crate::models::wishlist::WishlistEntry;

pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's saved products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, WishlistEntry>(
            "SELECT w.id, w.product_id, w.variant_id, w.created_at,
                    p.title, p.slug, p.price, p.currency, p.inventory, p.is_active,
                    (SELECT url FROM agape.product_image
                      WHERE product_id = p.id ORDER BY position LIMIT 1) AS thumbnail,
                    v.variant_name, v.price_delta
             FROM agape.wishlist_item w
             JOIN agape.product p ON p.id = w.product_id
             LEFT JOIN agape.product_variant v ON v.id = w.variant_id
             WHERE w.user_id = $1
             ORDER BY w.created_at DESC, w.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(entries)
    }

    /// Save a product (optionally a specific variant).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is unknown or
    /// inactive, or the variant doesn't belong to it.
    /// Returns `RepositoryError::Conflict` if it is already saved.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<WishlistItemId, RepositoryError> {
        let target_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM agape.product p
                WHERE p.id = $1 AND p.is_active
                  AND ($2::INTEGER IS NULL OR EXISTS (
                      SELECT 1 FROM agape.product_variant v
                      WHERE v.id = $2 AND v.product_id = p.id)))",
        )
        .bind(product_id)
        .bind(variant_id)
        .fetch_one(self.pool)
        .await?;

        if !target_exists {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query_scalar::<_, WishlistItemId>(
            "INSERT INTO agape.wishlist_item (user_id, product_id, variant_id)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "Product is already in your wishlist"))
    }

    /// Remove every saved entry for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if nothing was saved for it.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM agape.wishlist_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM agape.wishlist_item WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Whether the product is saved. With a variant, only that variant counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM agape.wishlist_item
                WHERE user_id = $1 AND product_id = $2
                  AND ($3::INTEGER IS NULL OR variant_id = $3))",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}
