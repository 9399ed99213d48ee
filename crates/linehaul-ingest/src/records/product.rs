//! Product catalog records

use serde::{Deserialize, Serialize};

use super::Record;
use crate::storage::SqlValue;
use crate::validate::Validate;
use linehaul_common::ClassifiedError;

pub(super) const COLUMNS: &[&str] = &["id", "name", "description", "price_cents", "sku"];

/// One row of the `products` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub sku: Option<String>,
}

impl Validate for Product {
    fn validate(&self) -> Result<(), ClassifiedError> {
        if self.id <= 0 {
            return Err(ClassifiedError::validation(format!(
                "product id must be positive, got {}",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ClassifiedError::validation("product name cannot be empty"));
        }
        if let Some(price) = self.price_cents {
            if price < 0 {
                return Err(ClassifiedError::validation(format!(
                    "product price cannot be negative, got {}",
                    price
                )));
            }
        }
        if let Some(ref sku) = self.sku {
            if sku.trim().is_empty() {
                return Err(ClassifiedError::validation("product sku cannot be blank"));
            }
        }
        Ok(())
    }
}

impl Record for Product {
    fn table() -> &'static str {
        "products"
    }

    fn columns() -> &'static [&'static str] {
        COLUMNS
    }

    fn into_row(self) -> Vec<SqlValue> {
        vec![
            SqlValue::BigInt(self.id),
            SqlValue::Text(self.name),
            self.description.map_or(SqlValue::Null, SqlValue::Text),
            self.price_cents.map_or(SqlValue::Null, SqlValue::BigInt),
            self.sku.map_or(SqlValue::Null, SqlValue::Text),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> Product {
        Product {
            id: 1,
            name: "Item One".to_string(),
            description: None,
            price_cents: Some(1299),
            sku: Some("SKU-001".to_string()),
        }
    }

    #[test]
    fn test_decode_with_absent_nullable_fields() {
        let product: Product = serde_json::from_str(r#"{"id":1,"name":"Item One"}"#).unwrap();
        assert_eq!(product.id, 1);
        assert_eq!(product.name, "Item One");
        assert!(product.description.is_none());
        assert!(product.price_cents.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());

        let mut bad = sample();
        bad.id = 0;
        assert!(bad.validate().is_err());

        let mut bad = sample();
        bad.name = "  ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = sample();
        bad.price_cents = Some(-5);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_row_matches_columns() {
        let row = sample().into_row();
        assert_eq!(row.len(), Product::columns().len());
        assert_eq!(row[0], SqlValue::BigInt(1));
        assert_eq!(row[2], SqlValue::Null);
    }
}
