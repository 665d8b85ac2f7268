//! Payment flow on top of the Paystack client.
//!
//! A payment row is written as `pending` when checkout starts. Both
//! `verify` and the `charge.success` webhook settle it through
//! [`PaymentRepository::settle`], so whichever arrives second is a no-op.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use agape_core::{
    CurrencyCode, Money, OrderId, OrderPaymentStatus, OrderStatus, PaymentId, PaymentStatus,
};

use super::paystack::{PaystackClient, PaystackError, Transaction, WebhookEvent};
use crate::db::payments::{NewPayment, Settlement};
use crate::db::{OrderRepository, PaymentRepository, RepositoryError};
use crate::models::order::Order;
use crate::models::payment::{Payment, PaymentInit};
use crate::models::user::CurrentUser;
use crate::models::{Paginated, Pagination, clamp_page};

const REFERENCE_PREFIX: &str = "AGP-PAY-";

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Gateway(#[from] PaystackError),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for PaymentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("Payment"),
            RepositoryError::Conflict(msg) => Self::Invalid(msg),
            other => Self::Repository(other),
        }
    }
}

/// Result of verifying a payment with the gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub payment: Payment,
    /// Gateway-side transaction status (`success`, `failed`, `abandoned`, ...).
    pub gateway_status: String,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Settled,
    AlreadySettled,
    UnknownReference,
    Ignored,
}

/// Admins see every payment; customers only their own.
#[must_use]
pub fn visible_to(user: &CurrentUser, payment: &Payment) -> bool {
    user.is_admin() || payment.user_id == user.id
}

/// A new unique payment reference.
#[must_use]
pub fn generate_reference() -> String {
    format!("{REFERENCE_PREFIX}{}", Uuid::new_v4())
}

/// Check that `user` may start a payment for `order`.
///
/// # Errors
///
/// Returns `PaymentError::NotFound` for someone else's order and
/// `PaymentError::Invalid` when the order can't be paid.
pub fn ensure_payable(order: &Order, user: &CurrentUser) -> Result<(), PaymentError> {
    if order.user_id != user.id {
        return Err(PaymentError::NotFound("Order"));
    }
    if order.payment_status == OrderPaymentStatus::Completed {
        return Err(PaymentError::Invalid("Order is already paid".to_string()));
    }
    if order.status != OrderStatus::Pending {
        return Err(PaymentError::Invalid(format!(
            "Cannot pay for an order that is {}",
            order.status.as_str()
        )));
    }
    Ok(())
}

/// Resolve the amount to refund, defaulting to the full payment.
///
/// # Errors
///
/// Returns `PaymentError::Invalid` for non-positive amounts or amounts above
/// what was paid.
pub fn refund_amount(payment: &Payment, requested: Option<Decimal>) -> Result<Decimal, PaymentError> {
    let amount = requested.unwrap_or(payment.amount);
    if amount <= Decimal::ZERO {
        return Err(PaymentError::Invalid(
            "Refund amount must be greater than zero".to_string(),
        ));
    }
    if amount > payment.amount {
        return Err(PaymentError::Invalid(
            "Refund amount cannot exceed the payment amount".to_string(),
        ));
    }
    Ok(amount)
}

fn currency_of(code: &str) -> Result<CurrencyCode, PaymentError> {
    code.parse().map_err(PaymentError::Invalid)
}

pub struct PaymentService<'a> {
    orders: OrderRepository<'a>,
    payments: PaymentRepository<'a>,
    gateway: &'a PaystackClient,
    callback_url: &'a str,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, gateway: &'a PaystackClient, callback_url: &'a str) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            payments: PaymentRepository::new(pool),
            gateway,
            callback_url,
        }
    }

    /// Start a Paystack checkout for one of the caller's pending orders.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotFound` for an unknown or foreign order,
    /// `PaymentError::Invalid` if it can't be paid, and
    /// `PaymentError::Gateway` if Paystack rejects the request.
    pub async fn initialize(
        &self,
        user: &CurrentUser,
        order_id: OrderId,
    ) -> Result<PaymentInit, PaymentError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(PaymentError::NotFound("Order"))?;
        ensure_payable(&order, user)?;

        let currency = currency_of(&order.currency)?;
        let amount_minor = Money::new(order.total, currency)
            .to_minor_units()
            .filter(|minor| *minor > 0)
            .ok_or_else(|| PaymentError::Invalid("Order total is not payable".to_string()))?;

        let reference = generate_reference();
        let metadata = json!({
            "orderId": order.id,
            "orderNumber": order.order_number,
            "userId": user.id,
        });

        let authorization = self
            .gateway
            .initialize(
                &user.email,
                amount_minor,
                &reference,
                currency.code(),
                self.callback_url,
                &metadata,
            )
            .await?;

        let payment = self
            .payments
            .create(&NewPayment {
                order_id: order.id,
                user_id: user.id,
                reference: &reference,
                amount: order.total,
                currency: currency.code(),
                authorization_url: &authorization.authorization_url,
                access_code: &authorization.access_code,
            })
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %order.id,
            reference = %reference,
            amount_minor,
            "Payment initialized"
        );

        Ok(PaymentInit {
            payment_id: payment.id,
            authorization_url: authorization.authorization_url,
            access_code: authorization.access_code,
            reference,
        })
    }

    /// Ask Paystack for the transaction state and record it.
    ///
    /// Ownership is checked before Paystack is contacted.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotFound` for an unknown reference or one the
    /// caller can't see, and `PaymentError::Gateway` if Paystack can't be
    /// reached.
    pub async fn verify(
        &self,
        user: &CurrentUser,
        reference: &str,
    ) -> Result<Verification, PaymentError> {
        let existing = self
            .payments
            .get_by_reference(reference)
            .await?
            .filter(|p| visible_to(user, p))
            .ok_or(PaymentError::NotFound("Payment"))?;
        if existing.status.is_settled() {
            return Ok(Verification {
                gateway_status: existing.status.as_str().to_owned(),
                payment: existing,
            });
        }

        let transaction = self.gateway.verify(reference).await?;
        let payment = self.record(&transaction).await?;

        Ok(Verification {
            payment,
            gateway_status: transaction.status,
        })
    }

    /// Handle a webhook delivery. The signature must already be checked.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Repository` if settlement fails.
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<WebhookOutcome, PaymentError> {
        if event.event != "charge.success" {
            tracing::debug!(event = %event.event, "Ignoring Paystack event");
            return Ok(WebhookOutcome::Ignored);
        }

        let transaction = match event.transaction() {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed charge.success payload");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        match self.settle(&transaction).await {
            Ok(settlement) if settlement.newly_settled => Ok(WebhookOutcome::Settled),
            Ok(_) => Ok(WebhookOutcome::AlreadySettled),
            Err(RepositoryError::NotFound) => {
                tracing::warn!(reference = %transaction.reference, "Webhook for unknown payment reference");
                Ok(WebhookOutcome::UnknownReference)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Refund a successful payment, fully or partially.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Invalid` for a bad amount or a payment that
    /// isn't refundable, and `PaymentError::Gateway` if Paystack refuses.
    pub async fn refund(
        &self,
        id: PaymentId,
        amount: Option<Decimal>,
        reason: Option<&str>,
    ) -> Result<Payment, PaymentError> {
        let payment = self
            .payments
            .get(id)
            .await?
            .ok_or(PaymentError::NotFound("Payment"))?;
        if payment.status != PaymentStatus::Success {
            return Err(PaymentError::Invalid(
                "Only successful payments can be refunded".to_string(),
            ));
        }
        let amount = refund_amount(&payment, amount)?;

        let currency = currency_of(&payment.currency)?;
        let amount_minor = Money::new(amount, currency)
            .to_minor_units()
            .ok_or_else(|| PaymentError::Invalid("Refund amount is out of range".to_string()))?;

        let refund = self
            .gateway
            .refund(&payment.reference, Some(amount_minor), reason)
            .await?;

        let payment = self.payments.mark_refunded(id, amount).await?;
        tracing::info!(
            payment_id = %id,
            refund_id = ?refund.id,
            refund_status = ?refund.status,
            %amount,
            "Payment refunded"
        );
        Ok(payment)
    }

    /// A payment, visible to its owner and to admins.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotFound` if absent or not visible.
    pub async fn get(&self, user: &CurrentUser, id: PaymentId) -> Result<Payment, PaymentError> {
        self.payments
            .get(id)
            .await?
            .filter(|p| visible_to(user, p))
            .ok_or(PaymentError::NotFound("Payment"))
    }

    /// Payments newest first. Customers only see their own.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Repository` if the query fails.
    pub async fn list(
        &self,
        user: &CurrentUser,
        status: Option<PaymentStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Paginated<Payment>, PaymentError> {
        let (page, limit) = clamp_page(page, limit);
        let owner = (!user.is_admin()).then_some(user.id);
        let offset = Pagination::new(page, limit, 0).offset();

        let (items, total) = self.payments.list(owner, status, limit, offset).await?;
        Ok(Paginated {
            items,
            pagination: Pagination::new(page, limit, total),
        })
    }

    async fn record(&self, transaction: &Transaction) -> Result<Payment, PaymentError> {
        if transaction.is_success() {
            return Ok(self.settle(transaction).await?.payment);
        }
        if transaction.is_failed() {
            let payment = self
                .payments
                .mark_failed(&transaction.reference, transaction.gateway_response.as_deref())
                .await?;
            tracing::info!(reference = %transaction.reference, "Payment failed");
            return Ok(payment);
        }
        // abandoned, ongoing, ...: leave pending
        self.payments
            .get_by_reference(&transaction.reference)
            .await?
            .ok_or(PaymentError::NotFound("Payment"))
    }

    async fn settle(&self, transaction: &Transaction) -> Result<Settlement, RepositoryError> {
        let settlement = self
            .payments
            .settle(
                &transaction.reference,
                transaction.gateway_response.as_deref(),
                transaction.paid_at,
            )
            .await?;

        if settlement.newly_settled {
            tracing::info!(
                payment_id = %settlement.payment.id,
                order_id = %settlement.payment.order_id,
                coupon_recorded = settlement.coupon_recorded,
                "Payment settled"
            );
            let expected = currency_of(&settlement.payment.currency)
                .ok()
                .and_then(|c| Money::new(settlement.payment.amount, c).to_minor_units());
            if let Some(minor) = expected
                && minor != transaction.amount
            {
                tracing::warn!(
                    reference = %transaction.reference,
                    expected = minor,
                    received = transaction.amount,
                    "Paystack amount differs from payment amount"
                );
            }
        }
        Ok(settlement)
    }
}

/// Frontend URL a Paystack callback redirects to.
#[must_use]
pub fn callback_redirect(frontend_url: &str, reference: &str) -> String {
    format!(
        "{}/checkout/success?reference={}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(reference)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use agape_core::{UserId, UserRole};

    use super::*;

    fn order(status: OrderStatus, payment_status: OrderPaymentStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(7),
            order_number: "AGP-20260301-ABC234".to_string(),
            user_id: UserId::new(1),
            status,
            payment_status,
            subtotal: Decimal::from(200),
            discount: Decimal::ZERO,
            shipping: Decimal::from(50),
            shipping_discount: Decimal::ZERO,
            total: Decimal::from(250),
            currency: "GHS".to_string(),
            coupon_id: None,
            shipping_address: json!({}),
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(amount: i64) -> Payment {
        let now = Utc::now();
        Payment {
            id: PaymentId::new(3),
            order_id: OrderId::new(7),
            user_id: UserId::new(1),
            reference: generate_reference(),
            amount: Decimal::from(amount),
            currency: "GHS".to_string(),
            status: PaymentStatus::Success,
            authorization_url: None,
            access_code: None,
            gateway_response: Some("Approved".to_string()),
            paid_at: Some(now),
            refunded_amount: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn customer(id: i32) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: "ama@example.com".to_string(),
            role: UserRole::Customer,
        }
    }

    #[test]
    fn test_reference_format() {
        let reference = generate_reference();
        assert!(reference.starts_with("AGP-PAY-"));
        assert!(Uuid::parse_str(&reference[REFERENCE_PREFIX.len()..]).is_ok());
        assert_ne!(reference, generate_reference());
    }

    #[test]
    fn test_pending_order_is_payable_by_owner() {
        let order = order(OrderStatus::Pending, OrderPaymentStatus::Pending);
        assert!(ensure_payable(&order, &customer(1)).is_ok());
    }

    #[test]
    fn test_foreign_order_not_found() {
        let order = order(OrderStatus::Pending, OrderPaymentStatus::Pending);
        assert!(matches!(
            ensure_payable(&order, &customer(2)),
            Err(PaymentError::NotFound("Order"))
        ));
    }

    #[test]
    fn test_paid_or_cancelled_order_rejected() {
        let paid = order(OrderStatus::Paid, OrderPaymentStatus::Completed);
        assert!(matches!(
            ensure_payable(&paid, &customer(1)),
            Err(PaymentError::Invalid(_))
        ));

        let cancelled = order(OrderStatus::Cancelled, OrderPaymentStatus::Pending);
        assert!(matches!(
            ensure_payable(&cancelled, &customer(1)),
            Err(PaymentError::Invalid(_))
        ));
    }

    #[test]
    fn test_refund_amount_defaults_to_full() {
        assert_eq!(refund_amount(&payment(250), None).unwrap(), Decimal::from(250));
        assert_eq!(
            refund_amount(&payment(250), Some(Decimal::from(100))).unwrap(),
            Decimal::from(100)
        );
    }

    #[test]
    fn test_payments_visible_to_owner_and_admin() {
        let payment = payment(250);
        assert!(visible_to(&customer(1), &payment));
        assert!(!visible_to(&customer(2), &payment));

        let admin = CurrentUser {
            role: UserRole::Admin,
            ..customer(9)
        };
        assert!(visible_to(&admin, &payment));
    }

    #[test]
    fn test_refund_amount_bounds() {
        assert!(refund_amount(&payment(250), Some(Decimal::from(251))).is_err());
        assert!(refund_amount(&payment(250), Some(Decimal::ZERO)).is_err());
        assert!(refund_amount(&payment(250), Some(Decimal::from(-5))).is_err());
    }

    #[test]
    fn test_callback_redirect() {
        assert_eq!(
            callback_redirect("https://agapelooks.com/", "AGP-PAY-1"),
            "https://agapelooks.com/checkout/success?reference=AGP-PAY-1"
        );
        assert_eq!(
            callback_redirect("http://localhost:3000", "a b"),
            "http://localhost:3000/checkout/success?reference=a%20b"
        );
    }
}
