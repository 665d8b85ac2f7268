//! Admin dashboard aggregates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::coupon::CouponStats;

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    /// Sum of successful payments.
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub orders: OrderStats,
    pub total_users: i64,
    pub active_products: i64,
    pub low_stock_products: i64,
    pub coupons: CouponStats,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Bucket size for sales trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl TrendPeriod {
    /// `date_trunc` unit.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Daily => "day",
            Self::Weekly => "week",
            Self::Monthly => "month",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period: DateTime<Utc>,
    pub order_count: i64,
    pub revenue: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_period_parse() {
        let p: TrendPeriod = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(p.unit(), "week");
        assert!(serde_json::from_str::<TrendPeriod>("\"hourly\"").is_err());
    }
}
