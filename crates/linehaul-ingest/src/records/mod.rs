//! Typed table records
//!
//! One module per target table. Each record type supplies its own serde field
//! mapping from JSON keys to typed fields (nullable columns as `Option`), its
//! single-record validation, and its projection into an ordered row for the
//! storage layer. The decoder core is type-parametric over these shapes and
//! knows no individual schema.

mod customer;
mod order;
mod product;

pub use customer::Customer;
pub use order::Order;
pub use product::Product;

use serde::de::DeserializeOwned;

use crate::storage::SqlValue;
use crate::validate::Validate;

/// A decodable record destined for one relational table.
pub trait Record: DeserializeOwned + Validate + Send + Sync + 'static {
    /// Target table name.
    fn table() -> &'static str;

    /// Ordered column names, matching [`into_row`](Record::into_row).
    fn columns() -> &'static [&'static str];

    /// Project the record into one row of column values, in column order.
    fn into_row(self) -> Vec<SqlValue>;
}

/// Data-only description of a loadable table.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

/// Every table the loader knows how to fill.
pub const REGISTRY: &[TableSchema] = &[
    TableSchema {
        table: "products",
        columns: product::COLUMNS,
    },
    TableSchema {
        table: "orders",
        columns: order::COLUMNS,
    },
    TableSchema {
        table: "customers",
        columns: customer::COLUMNS,
    },
];

/// Look a table up by name.
pub fn lookup(table: &str) -> Option<&'static TableSchema> {
    REGISTRY.iter().find(|schema| schema.table == table)
}
