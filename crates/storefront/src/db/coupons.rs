//! Coupon repository.

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};

use agape_core::{CouponId, OrderId, UserId};

use super::RepositoryError;
use crate::models::coupon::{
    Coupon, CouponListFilter, CouponPatch, CouponStats, CouponUsage, CouponWithUsage, NewCoupon,
};

const COUPON_COLUMNS: &str = "c.id, c.code, c.coupon_type, c.amount_or_pct, c.min_order_amount, \
    c.expires_at, c.usage_limit, c.used_count, c.per_user_limit, c.description, c.is_active, \
    c.metadata, c.created_at, c.updated_at";

const USAGE_TOTALS: &str = "COUNT(cu.id) AS total_usage, \
    COALESCE(SUM(cu.discount_amount), 0) AS total_discount_given";

pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, input: &NewCoupon) -> Result<Coupon, RepositoryError> {
        sqlx::query_as::<_, Coupon>(&format!(
            "INSERT INTO agape.coupon AS c (code, coupon_type, amount_or_pct, min_order_amount,
                expires_at, usage_limit, per_user_limit, description, is_active, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(input.normalized_code())
        .bind(input.coupon_type)
        .bind(input.amount_or_pct)
        .bind(input.min_order_amount)
        .bind(input.expires_at)
        .bind(input.usage_limit)
        .bind(input.per_user_limit.unwrap_or(1))
        .bind(input.description.as_deref())
        .bind(input.is_active.unwrap_or(true))
        .bind(json!({}))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "coupon code already exists"))
    }

    /// Admin listing with redemption totals, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &CouponListFilter,
    ) -> Result<Vec<CouponWithUsage>, RepositoryError> {
        let (limit, offset) = filter.bounds();
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COUPON_COLUMNS}, {USAGE_TOTALS}
             FROM agape.coupon c
             LEFT JOIN agape.coupon_usage cu ON cu.coupon_id = c.id
             WHERE TRUE"
        ));
        if let Some(is_active) = filter.is_active {
            qb.push(" AND c.is_active = ").push_bind(is_active);
        }
        if let Some(coupon_type) = filter.coupon_type {
            qb.push(" AND c.coupon_type = ").push_bind(coupon_type);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            qb.push(" AND (c.code ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" GROUP BY c.id ORDER BY c.created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let coupons = qb
            .build_query_as::<CouponWithUsage>()
            .fetch_all(self.pool)
            .await?;

        Ok(coupons)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stats(&self) -> Result<CouponStats, RepositoryError> {
        let stats = sqlx::query_as::<_, CouponStats>(
            "SELECT
                (SELECT COUNT(*) FROM agape.coupon) AS total_coupons,
                (SELECT COUNT(*) FROM agape.coupon WHERE is_active) AS active_coupons,
                (SELECT COUNT(*) FROM agape.coupon
                  WHERE is_active AND expires_at < NOW()) AS expired_coupons,
                (SELECT COUNT(*) FROM agape.coupon_usage) AS total_redemptions,
                (SELECT COALESCE(SUM(discount_amount), 0)
                   FROM agape.coupon_usage) AS total_discount_given",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(stats)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<CouponWithUsage>, RepositoryError> {
        let coupon = sqlx::query_as::<_, CouponWithUsage>(&format!(
            "SELECT {COUPON_COLUMNS}, {USAGE_TOTALS}
             FROM agape.coupon c
             LEFT JOIN agape.coupon_usage cu ON cu.coupon_id = c.id
             WHERE c.id = $1
             GROUP BY c.id"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(coupon)
    }

    /// Look up a coupon by code, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM agape.coupon c WHERE c.code = UPPER($1)"
        ))
        .bind(code.trim())
        .fetch_optional(self.pool)
        .await?;

        Ok(coupon)
    }

    /// Apply a partial update. The caller rejects empty patches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
    pub async fn update(&self, id: CouponId, patch: &CouponPatch) -> Result<Coupon, RepositoryError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE agape.coupon AS c SET ");
        let mut set = qb.separated(", ");
        if let Some(description) = &patch.description {
            set.push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(min) = patch.min_order_amount {
            set.push("min_order_amount = ").push_bind_unseparated(min);
        }
        // Inner `None` binds NULL and clears the column
        if let Some(expires_at) = patch.expires_at {
            set.push("expires_at = ").push_bind_unseparated(expires_at);
        }
        if let Some(limit) = patch.usage_limit {
            set.push("usage_limit = ").push_bind_unseparated(limit);
        }
        if let Some(limit) = patch.per_user_limit {
            set.push("per_user_limit = ").push_bind_unseparated(limit);
        }
        if let Some(is_active) = patch.is_active {
            set.push("is_active = ").push_bind_unseparated(is_active);
        }
        qb.push(" WHERE c.id = ").push_bind(id);
        qb.push(format!(" RETURNING {COUPON_COLUMNS}"));

        qb.build_query_as::<Coupon>()
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM agape.coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Redemptions of a coupon, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn usage_history(
        &self,
        id: CouponId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CouponUsage>, RepositoryError> {
        let usage = sqlx::query_as::<_, CouponUsage>(
            "SELECT cu.id, cu.coupon_id, cu.user_id, u.name AS user_name, u.email AS user_email,
                    cu.order_id, o.order_number, cu.discount_amount, cu.created_at
             FROM agape.coupon_usage cu
             LEFT JOIN agape.user u ON u.id = cu.user_id
             LEFT JOIN agape.customer_order o ON o.id = cu.order_id
             WHERE cu.coupon_id = $1
             ORDER BY cu.created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(usage)
    }

    /// How many times a user has redeemed a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn user_usage_count(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM agape.coupon_usage WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Record a redemption and bump `used_count`, at most once per order.
    ///
    /// Runs on the caller's executor so it can join a settlement transaction.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new usage row was written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either statement fails.
    pub async fn record_usage(
        conn: &mut sqlx::PgConnection,
        coupon_id: CouponId,
        user_id: UserId,
        order_id: OrderId,
        discount: Decimal,
    ) -> Result<bool, RepositoryError> {
        let inserted = sqlx::query(
            "INSERT INTO agape.coupon_usage (coupon_id, user_id, order_id, discount_amount)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (coupon_id, order_id) DO NOTHING",
        )
        .bind(coupon_id)
        .bind(user_id)
        .bind(order_id)
        .bind(discount)
        .execute(&mut *conn)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            increment_used_count(&mut *conn, coupon_id).await?;
        }

        Ok(inserted)
    }
}

async fn increment_used_count<'e>(
    executor: impl PgExecutor<'e>,
    coupon_id: CouponId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE agape.coupon SET used_count = used_count + 1 WHERE id = $1")
        .bind(coupon_id)
        .execute(executor)
        .await?;
    Ok(())
}
