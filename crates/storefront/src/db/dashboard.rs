//! Admin dashboard aggregates.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::dashboard::{OrderStats, TrendPeriod, TrendPoint};

/// Products at or below this inventory count as low stock.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Order counts and revenue for orders created in `[from, to]`.
    ///
    /// Revenue counts successful payments only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn order_stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<OrderStats, RepositoryError> {
        let stats = sqlx::query_as::<_, OrderStats>(
            "WITH scoped AS (
                SELECT o.id, o.status FROM agape.customer_order o
                WHERE ($1::TIMESTAMPTZ IS NULL OR o.created_at >= $1)
                  AND ($2::TIMESTAMPTZ IS NULL OR o.created_at <= $2)
             ), paid AS (
                SELECT p.order_id, p.amount FROM agape.payment p
                JOIN scoped s ON s.id = p.order_id
                WHERE p.status = 'success'
             )
             SELECT
                (SELECT COUNT(*) FROM scoped) AS total_orders,
                (SELECT COUNT(*) FROM scoped WHERE status = 'pending') AS pending_orders,
                (SELECT COUNT(*) FROM scoped WHERE status = 'delivered') AS delivered_orders,
                (SELECT COUNT(*) FROM scoped WHERE status = 'cancelled') AS cancelled_orders,
                (SELECT COALESCE(SUM(amount), 0) FROM paid) AS total_revenue,
                (SELECT COALESCE(ROUND(AVG(amount), 2), 0) FROM paid) AS average_order_value",
        )
        .bind(from)
        .bind(to)
        .fetch_one(self.pool)
        .await?;

        Ok(stats)
    }

    /// User, active product, and low-stock counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn catalog_counts(&self) -> Result<(i64, i64, i64), RepositoryError> {
        let counts = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT
                (SELECT COUNT(*) FROM agape.user),
                (SELECT COUNT(*) FROM agape.product WHERE is_active),
                (SELECT COUNT(*) FROM agape.product WHERE is_active AND inventory <= $1)",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_one(self.pool)
        .await?;

        Ok(counts)
    }

    /// Order count and paid revenue per period, most recent `limit` periods,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn trends(
        &self,
        period: TrendPeriod,
        limit: i64,
    ) -> Result<Vec<TrendPoint>, RepositoryError> {
        let points = sqlx::query_as::<_, TrendPoint>(
            "SELECT period, order_count, revenue FROM (
                SELECT date_trunc($1, o.created_at) AS period,
                       COUNT(DISTINCT o.id) AS order_count,
                       COALESCE(SUM(p.amount) FILTER (WHERE p.status = 'success'), 0) AS revenue
                FROM agape.customer_order o
                LEFT JOIN agape.payment p ON p.order_id = o.id
                GROUP BY 1
                ORDER BY 1 DESC
                LIMIT $2
             ) recent
             ORDER BY period ASC",
        )
        .bind(period.unit())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(points)
    }
}
