//! Collection repository.

use sqlx::{PgPool, Postgres, QueryBuilder};

use agape_core::CollectionId;

use super::RepositoryError;
use crate::models::collection::{Collection, CollectionPatch, CollectionWithCount, NewCollection};

const COLLECTION_COLUMNS: &str =
    "c.id, c.name, c.slug, c.description, c.image, c.featured, c.color, c.created_at, c.updated_at";

pub struct CollectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CollectionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All collections with their active product counts, featured first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_counts(&self) -> Result<Vec<CollectionWithCount>, RepositoryError> {
        let collections = sqlx::query_as::<_, CollectionWithCount>(&format!(
            "SELECT {COLLECTION_COLUMNS},
                    COUNT(p.id) FILTER (WHERE p.is_active) AS product_count
             FROM agape.collection c
             LEFT JOIN agape.product p ON p.collection_id = c.id
             GROUP BY c.id
             ORDER BY c.featured DESC, c.name ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(collections)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<CollectionWithCount>, RepositoryError> {
        let collection = sqlx::query_as::<_, CollectionWithCount>(&format!(
            "SELECT {COLLECTION_COLUMNS},
                    COUNT(p.id) FILTER (WHERE p.is_active) AS product_count
             FROM agape.collection c
             LEFT JOIN agape.product p ON p.collection_id = c.id
             WHERE c.slug = $1
             GROUP BY c.id"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(collection)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CollectionId) -> Result<Option<Collection>, RepositoryError> {
        let collection = sqlx::query_as::<_, Collection>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM agape.collection c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(collection)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: CollectionId) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM agape.collection WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        input: &NewCollection,
        slug: &str,
    ) -> Result<Collection, RepositoryError> {
        sqlx::query_as::<_, Collection>(&format!(
            "INSERT INTO agape.collection AS c (name, slug, description, image, featured, color)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.description.as_deref())
        .bind(input.image.as_deref())
        .bind(input.featured)
        .bind(input.color.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "collection slug already exists"))
    }

    /// Apply a partial update. The caller rejects empty patches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: CollectionId,
        patch: &CollectionPatch,
    ) -> Result<Collection, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE agape.collection AS c SET ");
        let mut set = qb.separated(", ");
        if let Some(name) = &patch.name {
            set.push("name = ").push_bind_unseparated(name.trim().to_owned());
        }
        if let Some(slug) = &patch.slug {
            set.push("slug = ")
                .push_bind_unseparated(crate::models::slugify(slug));
        }
        if let Some(description) = &patch.description {
            set.push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(image) = &patch.image {
            set.push("image = ").push_bind_unseparated(image.clone());
        }
        if let Some(featured) = patch.featured {
            set.push("featured = ").push_bind_unseparated(featured);
        }
        if let Some(color) = &patch.color {
            set.push("color = ").push_bind_unseparated(color.clone());
        }
        qb.push(" WHERE c.id = ").push_bind(id);
        qb.push(format!(" RETURNING {COLLECTION_COLUMNS}"));

        qb.build_query_as::<Collection>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::unique(e, "collection slug already exists"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection doesn't exist.
    pub async fn delete(&self, id: CollectionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM agape.collection WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete every collection. Products keep existing with no collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM agape.collection")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
