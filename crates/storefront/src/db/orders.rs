//! Order repository.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use agape_core::{OrderId, OrderPaymentStatus, OrderStatus, ProductId, UserId, VariantId};

use super::RepositoryError;
use crate::models::order::{CatalogLine, Order, OrderDraft, OrderItem, OrderSummary};

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.user_id, o.status, o.payment_status, \
    o.subtotal, o.discount, o.shipping, o.shipping_discount, o.total, o.currency, o.coupon_id, \
    o.shipping_address, o.metadata, o.created_at, o.updated_at";

const SUMMARY_EXTRAS: &str = "(SELECT COUNT(*) FROM agape.order_item i WHERE i.order_id = o.id) \
    AS item_count, u.email AS customer_email";

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Catalog data for pricing one checkout line.
    ///
    /// With a variant id, the variant must belong to the product or no row is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn catalog_line(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Option<CatalogLine>, RepositoryError> {
        let line = sqlx::query_as::<_, CatalogLine>(
            "SELECT p.id AS product_id, p.title, p.sku, p.price, p.inventory, p.is_active,
                    v.id AS variant_id, v.variant_name, v.sku AS variant_sku,
                    v.price_delta, v.stock AS variant_stock
             FROM agape.product p
             LEFT JOIN agape.product_variant v ON v.product_id = p.id AND v.id = $2
             WHERE p.id = $1 AND ($2::INTEGER IS NULL OR v.id IS NOT NULL)",
        )
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(line)
    }

    /// Insert an order and its items and take the stock, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if any line no longer has enough
    /// stock or the order number collides.
    pub async fn create(&self, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO agape.customer_order AS o (order_number, user_id, subtotal, discount,
                shipping, shipping_discount, total, currency, coupon_id, shipping_address, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&draft.order_number)
        .bind(draft.user_id)
        .bind(draft.totals.subtotal)
        .bind(draft.totals.discount)
        .bind(draft.totals.shipping)
        .bind(draft.totals.shipping_discount)
        .bind(draft.totals.total)
        .bind(&draft.currency)
        .bind(draft.coupon_id)
        .bind(&draft.shipping_address)
        .bind(&draft.metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "order number already exists"))?;

        for line in &draft.lines {
            sqlx::query(
                "INSERT INTO agape.order_item
                    (order_id, product_id, variant_id, title, sku, unit_price, quantity, line_total)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.variant_id)
            .bind(&line.title)
            .bind(&line.sku)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;

            let taken = take_stock(&mut tx, line.product_id, line.variant_id, line.quantity).await?;
            if !taken {
                return Err(RepositoryError::Conflict(format!(
                    "Insufficient stock for {}",
                    line.title
                )));
            }
        }

        tx.commit().await?;
        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM agape.customer_order o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, variant_id, title, sku, unit_price, quantity,
                    line_total
             FROM agape.order_item WHERE order_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Orders filtered by owner and/or status, newest first, with a total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderSummary>, i64), RepositoryError> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM agape.customer_order o WHERE TRUE");
        push_order_filters(&mut count, user_id, status);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORDER_COLUMNS}, {SUMMARY_EXTRAS}
             FROM agape.customer_order o
             JOIN agape.user u ON u.id = o.user_id
             WHERE TRUE"
        ));
        push_order_filters(&mut qb, user_id, status);
        qb.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let orders = qb
            .build_query_as::<OrderSummary>()
            .fetch_all(self.pool)
            .await?;

        Ok((orders, total))
    }

    /// Cancel a pending order and put its stock back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist or
    /// belongs to someone else.
    /// Returns `RepositoryError::Conflict` if the order is no longer pending.
    pub async fn cancel(&self, id: OrderId, user_id: UserId) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_order(&mut tx, id).await?;
        if current.user_id != user_id {
            return Err(RepositoryError::NotFound);
        }
        if current.status != OrderStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "Only pending orders can be cancelled (order is {})",
                current.status
            )));
        }

        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, variant_id, title, sku, unit_price, quantity,
                    line_total
             FROM agape.order_item WHERE order_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            restore_stock(&mut tx, item.product_id, item.variant_id, item.quantity).await?;
        }

        let order = set_status(&mut tx, id, OrderStatus::Cancelled).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Move an order along its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Conflict` if the transition isn't allowed.
    pub async fn transition(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_order(&mut tx, id).await?;
        if !current.status.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "Cannot change order status from {} to {next}",
                current.status
            )));
        }

        if next == OrderStatus::Cancelled {
            let items = sqlx::query_as::<_, (ProductId, Option<VariantId>, i32)>(
                "SELECT product_id, variant_id, quantity FROM agape.order_item WHERE order_id = $1",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
            for (product_id, variant_id, quantity) in items {
                restore_stock(&mut tx, product_id, variant_id, quantity).await?;
            }
        }

        let order = set_status(&mut tx, id, next).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Mark an order paid after a successful payment. No-op for orders that
    /// already left `pending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid(conn: &mut PgConnection, id: OrderId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE agape.customer_order
             SET payment_status = $2,
                 status = CASE WHEN status = 'pending' THEN 'paid'::agape.order_status
                               ELSE status END
             WHERE id = $1",
        )
        .bind(id)
        .bind(OrderPaymentStatus::Completed)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Set the customer-facing payment status of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_payment_status(
        conn: &mut PgConnection,
        id: OrderId,
        status: OrderPaymentStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE agape.customer_order SET payment_status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(conn)
            .await?;

        Ok(())
    }
}

fn push_order_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Option<UserId>,
    status: Option<OrderStatus>,
) {
    if let Some(user_id) = user_id {
        qb.push(" AND o.user_id = ").push_bind(user_id);
    }
    if let Some(status) = status {
        qb.push(" AND o.status = ").push_bind(status);
    }
}

async fn lock_order(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM agape.customer_order o WHERE o.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)
}

async fn set_status(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE agape.customer_order AS o SET status = $2 WHERE o.id = $1
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(status)
    .fetch_one(&mut **tx)
    .await?;

    Ok(order)
}

/// Decrement stock if enough is left. Returns `false` when it isn't.
async fn take_stock(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = match variant_id {
        Some(variant_id) => {
            sqlx::query(
                "UPDATE agape.product_variant SET stock = stock - $2
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(variant_id)
            .bind(quantity)
            .execute(&mut **tx)
            .await?
        }
        None => {
            sqlx::query(
                "UPDATE agape.product SET inventory = inventory - $2
                 WHERE id = $1 AND inventory >= $2",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut **tx)
            .await?
        }
    };

    Ok(result.rows_affected() == 1)
}

async fn restore_stock(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
) -> Result<(), RepositoryError> {
    match variant_id {
        Some(variant_id) => {
            sqlx::query("UPDATE agape.product_variant SET stock = stock + $2 WHERE id = $1")
                .bind(variant_id)
                .bind(quantity)
                .execute(&mut **tx)
                .await?;
        }
        None => {
            sqlx::query("UPDATE agape.product SET inventory = inventory + $2 WHERE id = $1")
                .bind(product_id)
                .bind(quantity)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}
