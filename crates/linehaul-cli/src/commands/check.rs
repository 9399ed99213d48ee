//! The `check` command: parse and validate without touching the database
//!
//! Dry-runs a JSONL file against a table's record type. The default path
//! uses the recovery-aware decoder so one pass reports every problem; with
//! `--strict` the first bad line aborts, matching what a fail-fast load
//! would do.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use linehaul_common::CancelToken;
use linehaul_ingest::decode::{self, RecoveryMode};
use linehaul_ingest::records::{Customer, Order, Product, Record, REGISTRY};
use linehaul_ingest::source;
use linehaul_ingest::validate::validate_all;

/// Summary of one dry run.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub table: String,
    pub total_lines: u64,
    pub decoded: usize,
    pub skipped: usize,
    pub invalid: usize,
}

impl CheckReport {
    /// True when the file would load without dropping or rejecting anything.
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.invalid == 0
    }
}

/// Check the file against the table named on the command line.
pub async fn run(
    token: &CancelToken,
    table: &str,
    file: &Path,
    mode: RecoveryMode,
    error_budget: u32,
    strict: bool,
) -> Result<CheckReport> {
    match table {
        "products" => run_typed::<Product>(token, file, mode, error_budget, strict).await,
        "orders" => run_typed::<Order>(token, file, mode, error_budget, strict).await,
        "customers" => run_typed::<Customer>(token, file, mode, error_budget, strict).await,
        other => {
            let known: Vec<&str> = REGISTRY.iter().map(|s| s.table).collect();
            anyhow::bail!(
                "Unknown table: {}. Known tables: {}",
                other,
                known.join(", ")
            )
        }
    }
}

async fn run_typed<T: Record>(
    token: &CancelToken,
    file: &Path,
    mode: RecoveryMode,
    error_budget: u32,
    strict: bool,
) -> Result<CheckReport> {
    let reader = source::open_source(file).await?;

    let (records, total_lines, skipped) = if strict {
        let records = decode::decode_lines::<T, _>(token, reader).await?;
        let count = records.len() as u64;
        (records, count, 0)
    } else {
        let outcome = decode::decode_with_recovery::<T, _>(token, reader, mode, error_budget).await;
        if let Some(fatal) = outcome.fatal_error() {
            anyhow::bail!("check aborted: {}", fatal);
        }
        (
            outcome.records,
            outcome.total_lines,
            outcome.skipped_lines.len(),
        )
    };

    let decoded = records.len();
    let (_, rejected) = validate_all(records);
    for err in &rejected {
        warn!(error = %err, "record would be rejected");
    }

    let report = CheckReport {
        table: T::table().to_string(),
        total_lines,
        decoded,
        skipped,
        invalid: rejected.len(),
    };

    info!(
        table = %report.table,
        total_lines = report.total_lines,
        decoded = report.decoded,
        skipped = report.skipped,
        invalid = report.invalid,
        clean = report.is_clean(),
        "check complete"
    );
    Ok(report)
}
