//! Payment types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use agape_core::{OrderId, PaymentId, PaymentStatus, UserId};

/// A Paystack transaction attempt for an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub authorization_url: Option<String>,
    pub access_code: Option<String>,
    pub gateway_response: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returned to the client to continue payment on Paystack's checkout page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInit {
    pub payment_id: PaymentId,
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}
