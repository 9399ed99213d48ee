//! Linehaul Ingest Library
//!
//! The ingestion core: streaming JSONL decoding with selectable error
//! recovery, batch validation, typed table records, and the PostgreSQL
//! bulk-load storage layer.
//!
//! # Example
//!
//! ```no_run
//! use linehaul_common::CancelToken;
//! use linehaul_ingest::decode::{self, RecoveryMode};
//! use linehaul_ingest::records::Product;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let token = CancelToken::new();
//!     let file = tokio::fs::File::open("products.jsonl").await?;
//!     let outcome =
//!         decode::decode_with_recovery::<Product, _>(&token, file, RecoveryMode::Skip, 0).await;
//!     println!("{} records, {} skipped", outcome.records.len(), outcome.skipped_lines.len());
//!     Ok(())
//! }
//! ```

pub mod decode;
pub mod records;
pub mod source;
pub mod storage;
pub mod validate;

// Re-export commonly used types
pub use decode::{ParseOutcome, RecoveryMode};
pub use validate::{validate_all, Validate};
