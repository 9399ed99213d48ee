//! Linehaul - JSONL bulk loader

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use linehaul_cli::commands;
use linehaul_cli::config::Config;
use linehaul_cli::commands::load::LoadOptions;
use linehaul_common::logging::{init_logging, LogLevel};
use linehaul_common::CancelToken;
use linehaul_ingest::decode::RecoveryMode;

#[derive(Parser, Debug)]
#[command(name = "linehaul")]
#[command(author, version, about = "Bulk-load line-delimited JSON into PostgreSQL")]
struct Cli {
    /// Path to a configuration file (defaults to ./linehaul.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse, validate, and bulk-load a JSONL file into a table
    Load {
        /// Target table name (see `linehaul tables`)
        #[arg(long)]
        table: String,

        /// Input file (.jsonl, or .jsonl.gz)
        file: PathBuf,

        /// Recovery mode: skip or fail-fast (overrides configuration)
        #[arg(long)]
        mode: Option<RecoveryMode>,

        /// Skipped-line budget, 0 = unlimited (overrides configuration)
        #[arg(long)]
        error_budget: Option<u32>,

        /// Abort the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Stream records straight into the database (strict decoding)
        #[arg(long)]
        streaming: bool,
    },

    /// Parse and validate a JSONL file without loading anything
    Check {
        /// Target table name (see `linehaul tables`)
        #[arg(long)]
        table: String,

        /// Input file (.jsonl, or .jsonl.gz)
        file: PathBuf,

        /// Recovery mode: skip or fail-fast
        #[arg(long, default_value = "skip")]
        mode: RecoveryMode,

        /// Skipped-line budget, 0 = unlimited
        #[arg(long, default_value_t = 0)]
        error_budget: u32,

        /// Abort at the first bad line instead of collecting every problem
        #[arg(long)]
        strict: bool,
    },

    /// List the tables this loader knows how to fill
    Tables,
}

fn cancel_token_for(timeout_secs: Option<u64>) -> CancelToken {
    let token = match timeout_secs {
        Some(secs) => CancelToken::with_deadline(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            signal_token.cancel();
        }
    });

    token
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    let mut log_config = config.logging.clone();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    match cli.command {
        Command::Load {
            table,
            file,
            mode,
            error_budget,
            timeout_secs,
            streaming,
        } => {
            let token = cancel_token_for(timeout_secs);

            let mut options = LoadOptions::from_config(&config);
            if let Some(mode) = mode {
                options.mode = mode;
            }
            if let Some(budget) = error_budget {
                options.error_budget = budget;
            }
            options.streaming = options.streaming || streaming;

            let report = commands::load::run(&token, &config, &table, &file, options).await?;
            info!(run_id = %report.run_id, rows_loaded = report.rows_loaded, "done");
        }
        Command::Check {
            table,
            file,
            mode,
            error_budget,
            strict,
        } => {
            let token = cancel_token_for(None);
            let report = commands::check::run(&token, &table, &file, mode, error_budget, strict).await?;
            if !report.is_clean() {
                anyhow::bail!(
                    "check found problems: {} skipped lines, {} invalid records",
                    report.skipped,
                    report.invalid
                );
            }
        }
        Command::Tables => {
            commands::tables()?;
        }
    }

    Ok(())
}
