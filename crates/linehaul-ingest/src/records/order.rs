//! Order records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;
use crate::storage::SqlValue;
use crate::validate::Validate;
use linehaul_common::ClassifiedError;

pub(super) const COLUMNS: &[&str] = &[
    "id",
    "customer_id",
    "product_id",
    "quantity",
    "unit_price_cents",
    "ordered_at",
];

/// One row of the `orders` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub ordered_at: Option<DateTime<Utc>>,
}

impl Validate for Order {
    fn validate(&self) -> Result<(), ClassifiedError> {
        if self.id <= 0 {
            return Err(ClassifiedError::validation(format!(
                "order id must be positive, got {}",
                self.id
            )));
        }
        if self.customer_id <= 0 {
            return Err(ClassifiedError::validation("order customer_id must be positive"));
        }
        if self.product_id <= 0 {
            return Err(ClassifiedError::validation("order product_id must be positive"));
        }
        if self.quantity <= 0 {
            return Err(ClassifiedError::validation(format!(
                "order quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.unit_price_cents < 0 {
            return Err(ClassifiedError::validation("order unit price cannot be negative"));
        }
        Ok(())
    }
}

impl Record for Order {
    fn table() -> &'static str {
        "orders"
    }

    fn columns() -> &'static [&'static str] {
        COLUMNS
    }

    fn into_row(self) -> Vec<SqlValue> {
        vec![
            SqlValue::BigInt(self.id),
            SqlValue::BigInt(self.customer_id),
            SqlValue::BigInt(self.product_id),
            SqlValue::Int(self.quantity),
            SqlValue::BigInt(self.unit_price_cents),
            self.ordered_at.map_or(SqlValue::Null, SqlValue::Timestamp),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_timestamp() {
        let order: Order = serde_json::from_str(
            r#"{"id":7,"customer_id":3,"product_id":1,"quantity":2,"unit_price_cents":1299,"ordered_at":"2026-01-15T09:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(order.quantity, 2);
        assert!(order.ordered_at.is_some());
    }

    #[test]
    fn test_validate_rejects_non_positive_quantity() {
        let order = Order {
            id: 1,
            customer_id: 1,
            product_id: 1,
            quantity: 0,
            unit_price_cents: 100,
            ordered_at: None,
        };
        assert!(order.validate().is_err());
    }
}
