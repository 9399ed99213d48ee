//! PostgreSQL bulk-load storage layer
//!
//! Accepts ordered rows plus an ordered column list and a table name, and
//! owns everything transactional about getting them into PostgreSQL: chunk
//! size, multi-row `INSERT` construction, and per-chunk commit/rollback.
//!
//! Failures are classified so the retry engine can gate re-runs: connection
//! and pool-level problems are Retryable, everything else is Fatal.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info};

use linehaul_common::ClassifiedError;

/// Default rows per `INSERT` transaction.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/linehaul".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        }
    }
}

/// One column value of one row, typed for binding.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    fn push_to(&self, b: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>) {
        match self {
            SqlValue::Null => {
                b.push("NULL");
            }
            SqlValue::Bool(v) => {
                b.push_bind(*v);
            }
            SqlValue::Int(v) => {
                b.push_bind(*v);
            }
            SqlValue::BigInt(v) => {
                b.push_bind(*v);
            }
            SqlValue::Double(v) => {
                b.push_bind(*v);
            }
            SqlValue::Text(v) => {
                b.push_bind(v.clone());
            }
            SqlValue::Timestamp(v) => {
                b.push_bind(*v);
            }
            SqlValue::Json(v) => {
                b.push_bind(v.clone());
            }
        }
    }
}

/// Open a connection pool from configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .context("Failed to connect to database")?;

    debug!(max_connections = config.max_connections, "database pool ready");
    Ok(pool)
}

/// Classify a database failure for retry gating.
///
/// Connection-level problems (I/O, TLS, pool exhaustion/shutdown) and
/// serialization/deadlock rollbacks are transient; anything else — constraint
/// violations, bad SQL, missing tables — will not improve on retry.
pub fn classify_db_error(err: sqlx::Error) -> ClassifiedError {
    let retryable = match &err {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => true,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            // serialization_failure, deadlock_detected
            Some("40001") | Some("40P01")
        ),
        _ => false,
    };

    if retryable {
        ClassifiedError::retryable("database operation failed transiently").caused_by(err)
    } else {
        ClassifiedError::fatal("database operation failed").caused_by(err)
    }
}

/// Chunked, transactional bulk writer for one pool.
pub struct BulkLoader {
    pool: PgPool,
    batch_size: usize,
}

impl BulkLoader {
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Insert all rows, committing one transaction per chunk.
    ///
    /// Returns the number of rows written. A failing chunk rolls back only
    /// itself; previously committed chunks stay committed, and the classified
    /// error tells the caller whether re-running the chunk is worthwhile.
    pub async fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        let mut total: u64 = 0;

        for chunk in rows.chunks(self.batch_size) {
            total += self.insert_chunk(table, columns, chunk).await?;
        }

        info!(table, rows = total, "bulk load committed");
        Ok(total)
    }

    /// Insert a single chunk inside its own transaction.
    pub async fn insert_chunk(
        &self,
        table: &str,
        columns: &[&str],
        chunk: &[Vec<SqlValue>],
    ) -> Result<u64> {
        if chunk.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, columns.join(", ")));
        builder.push_values(chunk.iter(), |mut b, row| {
            for value in row {
                value.push_to(&mut b);
            }
        });

        let result = builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;
        tx.commit().await.map_err(classify_db_error)?;

        debug!(table, rows = result.rows_affected(), "chunk committed");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use linehaul_common::ErrorKind;

    #[test]
    fn test_io_errors_are_retryable() {
        let err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert_eq!(classify_db_error(err).kind(), ErrorKind::Retryable);

        assert_eq!(
            classify_db_error(sqlx::Error::PoolTimedOut).kind(),
            ErrorKind::Retryable
        );
    }

    #[test]
    fn test_other_errors_are_fatal() {
        assert_eq!(
            classify_db_error(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Fatal
        );
    }

    #[test]
    fn test_default_database_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert!(config.url.starts_with("postgresql://"));
    }
}
