//! The `load` command: parse, validate, and bulk-load one JSONL file
//!
//! Two execution paths share the same validation and storage plumbing:
//!
//! - the default path decodes the whole file under the configured recovery
//!   mode, batch-validates the survivors, then loads rows chunk by chunk;
//! - the `--streaming` path uses the strict streaming decoder and inserts
//!   batches as records arrive, keeping memory flat for very large files
//!   at the price of fail-fast semantics.
//!
//! Every chunk insert runs under the retry engine, so transient database
//! failures are retried with backoff while anything else aborts the run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};
use uuid::Uuid;

use linehaul_common::{retry, CancelToken, ErrorKind, RetryPolicy};
use linehaul_ingest::decode::{self, RecoveryMode};
use linehaul_ingest::records::{Customer, Order, Product, Record, REGISTRY};
use linehaul_ingest::storage::{self, BulkLoader, SqlValue};
use linehaul_ingest::validate::{validate_all, Validate};
use linehaul_ingest::source;

use crate::config::Config;

/// Per-run options resolved from CLI flags over configuration defaults.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub mode: RecoveryMode,
    pub error_budget: u32,
    pub streaming: bool,
}

impl LoadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.ingest.mode,
            error_budget: config.ingest.error_budget,
            streaming: config.ingest.streaming,
        }
    }
}

/// Summary of one completed load run.
#[derive(Debug, Serialize)]
pub struct LoadReport {
    pub run_id: Uuid,
    pub table: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_lines: u64,
    pub decoded: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub rows_loaded: u64,
}

/// Run a load against the table named on the command line.
pub async fn run(
    token: &CancelToken,
    config: &Config,
    table: &str,
    file: &Path,
    options: LoadOptions,
) -> Result<LoadReport> {
    match table {
        "products" => run_typed::<Product>(token, config, file, options).await,
        "orders" => run_typed::<Order>(token, config, file, options).await,
        "customers" => run_typed::<Customer>(token, config, file, options).await,
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
    config: &Config,
    file: &Path,
    options: LoadOptions,
) -> Result<LoadReport> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    let checksum = source::file_sha256(file).await?;
    info!(
        %run_id,
        table = T::table(),
        file = %file.display(),
        sha256 = %checksum,
        mode = %options.mode,
        streaming = options.streaming,
        "starting load"
    );

    let reader = source::open_source(file).await?;
    let pool = storage::connect(&config.database).await?;
    let loader = BulkLoader::new(pool, config.ingest.batch_size);
    let policy = config.retry_policy();

    let mut report = if options.streaming {
        stream_load::<T>(token, &loader, &policy, config.ingest.batch_size, reader).await?
    } else {
        batch_load::<T>(token, &loader, &policy, options, reader).await?
    };

    report.run_id = run_id;
    report.table = T::table().to_string();
    report.started_at = started_at;
    report.finished_at = Utc::now();

    info!(
        %run_id,
        table = %report.table,
        total_lines = report.total_lines,
        decoded = report.decoded,
        skipped = report.skipped,
        invalid = report.invalid,
        rows_loaded = report.rows_loaded,
        "load complete"
    );
    Ok(report)
}

fn empty_report() -> LoadReport {
    LoadReport {
        run_id: Uuid::nil(),
        table: String::new(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
        total_lines: 0,
        decoded: 0,
        skipped: 0,
        invalid: 0,
        rows_loaded: 0,
    }
}

/// Decode the whole file under the recovery mode, then validate and load.
async fn batch_load<T: Record>(
    token: &CancelToken,
    loader: &BulkLoader,
    policy: &RetryPolicy,
    options: LoadOptions,
    reader: source::SourceReader,
) -> Result<LoadReport> {
    let mut outcome =
        decode::decode_with_recovery::<T, _>(token, reader, options.mode, options.error_budget)
            .await;

    if let Some(index) = outcome.errors.iter().position(|e| e.is(ErrorKind::Fatal)) {
        let fatal = outcome.errors.remove(index);
        error!(error = %fatal, "load aborted before storage");
        return Err(fatal.into());
    }

    // Fail-fast callers asked for all-or-nothing semantics.
    if options.mode == RecoveryMode::FailFast && !outcome.errors.is_empty() {
        let bad = outcome.errors.remove(0);
        error!(error = %bad, "load aborted on first bad line");
        return Err(bad.into());
    }

    let (valid, rejected) = validate_all(outcome.records);
    for err in &rejected {
        warn!(error = %err, "record rejected by validation");
    }

    let rows: Vec<Vec<SqlValue>> = valid.into_iter().map(Record::into_row).collect();
    let mut rows_loaded: u64 = 0;
    for chunk in rows.chunks(loader.batch_size()) {
        rows_loaded += retry::execute(token, policy, || {
            loader.insert_chunk(T::table(), T::columns(), chunk)
        })
        .await?;
    }

    Ok(LoadReport {
        total_lines: outcome.total_lines,
        decoded: rows.len() + rejected.len(),
        skipped: outcome.skipped_lines.len(),
        invalid: rejected.len(),
        rows_loaded,
        ..empty_report()
    })
}

/// Strict streaming path: insert batches as records arrive.
async fn stream_load<T: Record>(
    token: &CancelToken,
    loader: &BulkLoader,
    policy: &RetryPolicy,
    batch_size: usize,
    reader: source::SourceReader,
) -> Result<LoadReport> {
    let (mut items, done) = decode::stream_decode::<T, _>(token, reader);

    let mut decoded: usize = 0;
    let mut invalid: usize = 0;
    let mut rows_loaded: u64 = 0;
    let mut batch: Vec<Vec<SqlValue>> = Vec::with_capacity(batch_size);

    while let Some(record) = items.recv().await {
        decoded += 1;
        match record.validate() {
            Ok(()) => batch.push(record.into_row()),
            Err(err) => {
                invalid += 1;
                warn!(error = %err, "record rejected by validation");
            }
        }

        if batch.len() >= batch_size {
            rows_loaded += retry::execute(token, policy, || {
                loader.insert_chunk(T::table(), T::columns(), &batch)
            })
            .await?;
            batch.clear();
        }
    }

    // The terminal slot resolves exactly once; read it before flushing so a
    // failed stream does not commit its trailing partial batch.
    let terminal = done
        .await
        .map_err(|_| anyhow::anyhow!("stream producer dropped without a terminal status"))?;
    if let Err(err) = terminal {
        error!(error = %err, rows_loaded, "stream aborted; already-committed batches remain");
        return Err(err.into());
    }

    if !batch.is_empty() {
        rows_loaded += retry::execute(token, policy, || {
            loader.insert_chunk(T::table(), T::columns(), &batch)
        })
        .await?;
    }

    Ok(LoadReport {
        // The streaming path counts decoded records; raw line numbers stay
        // inside the producer.
        total_lines: decoded as u64,
        decoded,
        skipped: 0,
        invalid,
        rows_loaded,
        ..empty_report()
    })
}
