//! Payment repository.
//!
//! Settlement is the one multi-table write here: the payment row, the order's
//! status, and the coupon redemption change together or not at all.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use agape_core::{CouponId, OrderId, OrderPaymentStatus, PaymentId, PaymentStatus, UserId};

use super::{CouponRepository, OrderRepository, RepositoryError};
use crate::models::payment::Payment;

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, reference, amount, currency, status, \
    authorization_url, access_code, gateway_response, paid_at, refunded_amount, created_at, \
    updated_at";

/// Fields for a new pending payment.
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reference: &'a str,
    pub amount: Decimal,
    pub currency: &'a str,
    pub authorization_url: &'a str,
    pub access_code: &'a str,
}

/// Outcome of settling a payment.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment: Payment,
    /// `false` when the payment had already been settled.
    pub newly_settled: bool,
    /// Whether a coupon redemption was written.
    pub coupon_recorded: bool,
}

pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the reference is already used.
    pub async fn create(&self, input: &NewPayment<'_>) -> Result<Payment, RepositoryError> {
        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO agape.payment
                (order_id, user_id, reference, amount, currency, authorization_url, access_code)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(input.order_id)
        .bind(input.user_id)
        .bind(input.reference)
        .bind(input.amount)
        .bind(input.currency)
        .bind(input.authorization_url)
        .bind(input.access_code)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique(e, "payment reference already exists"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM agape.payment WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(payment)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM agape.payment WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;

        Ok(payment)
    }

    /// Payments filtered by owner and/or status, newest first, with a total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Payment>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM agape.payment WHERE TRUE");
        push_payment_filters(&mut count, user_id, status);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PAYMENT_COLUMNS} FROM agape.payment WHERE TRUE"
        ));
        push_payment_filters(&mut qb, user_id, status);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let payments = qb.build_query_as::<Payment>().fetch_all(self.pool).await?;
        Ok((payments, total))
    }

    /// Mark a payment successful, the order paid, and redeem its coupon.
    ///
    /// Safe to call repeatedly for the same reference: once the payment is
    /// `success` later calls change nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no payment has this reference.
    pub async fn settle(
        &self,
        reference: &str,
        gateway_response: Option<&str>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Settlement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM agape.payment WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if payment.status.is_settled() {
            tx.rollback().await?;
            return Ok(Settlement {
                payment,
                newly_settled: false,
                coupon_recorded: false,
            });
        }

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE agape.payment
             SET status = $2, gateway_response = COALESCE($3, gateway_response),
                 paid_at = COALESCE($4, NOW())
             WHERE id = $1
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(PaymentStatus::Success)
        .bind(gateway_response)
        .bind(paid_at)
        .fetch_one(&mut *tx)
        .await?;

        OrderRepository::mark_paid(&mut tx, payment.order_id).await?;

        let coupon = sqlx::query_as::<_, (Option<CouponId>, UserId, Decimal)>(
            "SELECT coupon_id, user_id, discount + shipping_discount
             FROM agape.customer_order WHERE id = $1",
        )
        .bind(payment.order_id)
        .fetch_one(&mut *tx)
        .await?;

        let coupon_recorded = match coupon {
            (Some(coupon_id), user_id, amount) => {
                CouponRepository::record_usage(&mut tx, coupon_id, user_id, payment.order_id, amount)
                    .await?
            }
            (None, _, _) => false,
        };

        tx.commit().await?;
        Ok(Settlement {
            payment,
            newly_settled: true,
            coupon_recorded,
        })
    }

    /// Record a failed attempt. Settled payments are left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no payment has this reference.
    pub async fn mark_failed(
        &self,
        reference: &str,
        gateway_response: Option<&str>,
    ) -> Result<Payment, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE agape.payment
             SET status = CASE WHEN status = 'pending' THEN 'failed'::agape.payment_status
                               ELSE status END,
                 gateway_response = COALESCE($2, gateway_response)
             WHERE reference = $1
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(reference)
        .bind(gateway_response)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if payment.status == PaymentStatus::Failed {
            OrderRepository::set_payment_status(&mut tx, payment.order_id, OrderPaymentStatus::Failed)
                .await?;
        }

        tx.commit().await?;
        Ok(payment)
    }

    /// Mark a successful payment refunded, along with its order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment doesn't exist.
    /// Returns `RepositoryError::Conflict` if it isn't in `success`.
    pub async fn mark_refunded(
        &self,
        id: PaymentId,
        amount: Decimal,
    ) -> Result<Payment, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE agape.payment SET status = $2, refunded_amount = $3
             WHERE id = $1 AND status = 'success'
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(PaymentStatus::Refunded)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment) = payment else {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM agape.payment WHERE id = $1)",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            return Err(if exists {
                RepositoryError::Conflict("Only successful payments can be refunded".to_owned())
            } else {
                RepositoryError::NotFound
            });
        };

        OrderRepository::set_payment_status(&mut tx, payment.order_id, OrderPaymentStatus::Refunded)
            .await?;

        tx.commit().await?;
        Ok(payment)
    }
}

fn push_payment_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Option<UserId>,
    status: Option<PaymentStatus>,
) {
    if let Some(user_id) = user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status);
    }
}
