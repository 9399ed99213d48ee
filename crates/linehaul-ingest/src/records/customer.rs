//! Customer records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;
use crate::storage::SqlValue;
use crate::validate::Validate;
use linehaul_common::ClassifiedError;

pub(super) const COLUMNS: &[&str] = &["id", "email", "name", "created_at"];

/// One row of the `customers` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Validate for Customer {
    fn validate(&self) -> Result<(), ClassifiedError> {
        if self.id <= 0 {
            return Err(ClassifiedError::validation(format!(
                "customer id must be positive, got {}",
                self.id
            )));
        }
        // Minimal shape check; real address verification happens elsewhere.
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ClassifiedError::validation(format!(
                "customer email is not valid: {:?}",
                self.email
            )));
        }
        Ok(())
    }
}

impl Record for Customer {
    fn table() -> &'static str {
        "customers"
    }

    fn columns() -> &'static [&'static str] {
        COLUMNS
    }

    fn into_row(self) -> Vec<SqlValue> {
        vec![
            SqlValue::BigInt(self.id),
            SqlValue::Text(self.email),
            self.name.map_or(SqlValue::Null, SqlValue::Text),
            self.created_at.map_or(SqlValue::Null, SqlValue::Timestamp),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_shape() {
        let customer = Customer {
            id: 1,
            email: "a@example.com".to_string(),
            name: None,
            created_at: None,
        };
        assert!(customer.validate().is_ok());

        let mut bad = customer.clone();
        bad.email = "not-an-email".to_string();
        assert!(bad.validate().is_err());

        let mut bad = customer;
        bad.email = " ".to_string();
        assert!(bad.validate().is_err());
    }
}
