//! Streaming JSONL decoder with selectable error recovery
//!
//! Decodes line-delimited JSON into typed records, one JSON object per
//! non-blank line. Three entry shapes share the same parsing rules:
//!
//! - [`decode_lines`]: strict batch — the first bad line aborts the call and
//!   discards everything decoded before it
//! - [`decode_with_recovery`]: recovery-aware — [`RecoveryMode::Skip`] drops
//!   bad lines (subject to an error budget), [`RecoveryMode::FailFast`] stops
//!   at the first bad line; either way the caller gets a full
//!   [`ParseOutcome`]
//! - [`stream_decode`]: asynchronous producer feeding a bounded channel so a
//!   slow consumer backpressures the reader instead of buffering the file
//!
//! Shared rules: blank lines are skipped silently (they count toward
//! `total_lines` only); individual lines may be up to 10 MiB; cancellation is
//! checked at every line boundary; read failures and cancellation are Fatal,
//! a single line's decode failure is Skippable.

use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use linehaul_common::{CancelToken, ClassifiedError};

/// Largest accepted line. A single oversized JSON object must not truncate or
/// corrupt adjacent records, so the framing buffer grows up to this bound.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Capacity of the bounded item channel used by [`stream_decode`].
pub const STREAM_BUFFER: usize = 100;

/// How the recovery-aware decoder reacts to a bad line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Log and continue past bad lines, subject to the error budget.
    #[default]
    Skip,
    /// Stop at the first bad line.
    FailFast,
}

impl std::str::FromStr for RecoveryMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(RecoveryMode::Skip),
            "fail-fast" | "fail_fast" | "failfast" => Ok(RecoveryMode::FailFast),
            _ => Err(anyhow::anyhow!("Invalid recovery mode: {}", s)),
        }
    }
}

impl std::fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryMode::Skip => write!(f, "skip"),
            RecoveryMode::FailFast => write!(f, "fail-fast"),
        }
    }
}

/// Aggregate result of one recovery-aware parse, finalized when the source is
/// exhausted, an unrecoverable condition occurs, or the run is cancelled.
#[derive(Debug)]
pub struct ParseOutcome<T> {
    /// Successfully decoded records, in source line order.
    pub records: Vec<T>,
    /// One classified error per failing line, plus at most one terminal error.
    pub errors: Vec<ClassifiedError>,
    /// 1-based indices of dropped lines, strictly increasing.
    pub skipped_lines: Vec<u64>,
    /// Every line seen, blank lines included.
    pub total_lines: u64,
}

impl<T> Default for ParseOutcome<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: Vec::new(),
            skipped_lines: Vec::new(),
            total_lines: 0,
        }
    }
}

impl<T> ParseOutcome<T> {
    /// True when every non-blank line decoded cleanly.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// The terminal Fatal error, if the parse was cut short by one.
    pub fn fatal_error(&self) -> Option<&ClassifiedError> {
        self.errors
            .iter()
            .find(|e| e.is(linehaul_common::ErrorKind::Fatal))
    }
}

fn read_failure(err: LinesCodecError, line_number: u64) -> ClassifiedError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => ClassifiedError::fatal(format!(
            "line {} exceeds maximum length of {} bytes",
            line_number, MAX_LINE_BYTES
        ))
        .with_context("line", line_number),
        LinesCodecError::Io(io) => {
            ClassifiedError::fatal(format!("failed to read line {}", line_number))
                .caused_by(io)
                .with_context("line", line_number)
        }
    }
}

fn decode_failure(err: serde_json::Error, line_number: u64) -> ClassifiedError {
    ClassifiedError::skippable(format!("invalid JSON on line {}", line_number))
        .caused_by(err)
        .with_context("line", line_number)
}

/// Strict batch decode: every non-blank line must parse.
///
/// The first failure aborts immediately with a line-numbered error and all
/// previously decoded records are discarded with it — no partial results.
/// This is the contract for callers that must treat any malformed line as
/// total failure; callers with more risk tolerance use
/// [`decode_with_recovery`].
pub async fn decode_lines<T, R>(token: &CancelToken, source: R) -> anyhow::Result<Vec<T>>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(source, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut records = Vec::new();
    let mut line_number: u64 = 0;

    loop {
        if token.is_cancelled() {
            return Err(token.error().into());
        }

        let Some(next) = lines.next().await else {
            break;
        };
        line_number += 1;

        let line = next.map_err(|e| read_failure(e, line_number))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = serde_json::from_str(trimmed).map_err(|e| decode_failure(e, line_number))?;
        records.push(record);
    }

    debug!(records = records.len(), total_lines = line_number, "strict decode complete");
    Ok(records)
}

/// Recovery-aware decode.
///
/// Reads the source to exhaustion (Skip mode) or to the first failure
/// (FailFast mode), accumulating records, classified errors, and skipped line
/// numbers into a [`ParseOutcome`]. In Skip mode a positive `error_budget`
/// bounds the number of tolerated bad lines: reaching it synthesizes a Fatal
/// threshold error and stops, because that much corruption means the input
/// can no longer be trusted. A budget of 0 tolerates any number of bad lines.
pub async fn decode_with_recovery<T, R>(
    token: &CancelToken,
    source: R,
    mode: RecoveryMode,
    error_budget: u32,
) -> ParseOutcome<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(source, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut outcome = ParseOutcome::default();

    loop {
        if token.is_cancelled() {
            outcome.errors.push(token.error());
            break;
        }

        let Some(next) = lines.next().await else {
            break;
        };
        outcome.total_lines += 1;
        let line_number = outcome.total_lines;

        let line = match next {
            Ok(line) => line,
            Err(err) => {
                outcome.errors.push(read_failure(err, line_number));
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => outcome.records.push(record),
            Err(err) => {
                let classified = decode_failure(err, line_number);
                warn!(line = line_number, error = %classified, "bad line");
                outcome.errors.push(classified);

                match mode {
                    RecoveryMode::FailFast => break,
                    RecoveryMode::Skip => {
                        outcome.skipped_lines.push(line_number);
                        if error_budget > 0 && outcome.skipped_lines.len() as u32 >= error_budget {
                            outcome.errors.push(
                                ClassifiedError::fatal(format!(
                                    "error threshold exceeded: {} lines skipped",
                                    outcome.skipped_lines.len()
                                ))
                                .with_context("error_budget", error_budget)
                                .with_context("skipped", outcome.skipped_lines.len()),
                            );
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!(
        records = outcome.records.len(),
        errors = outcome.errors.len(),
        skipped = outcome.skipped_lines.len(),
        total_lines = outcome.total_lines,
        %mode,
        "recovery decode complete"
    );
    outcome
}

/// Streaming decode with backpressure.
///
/// Spawns a producer that reads the source and sends each decoded record into
/// a bounded channel of capacity [`STREAM_BUFFER`]; a slow consumer therefore
/// throttles the reader instead of growing a buffer. The terminal slot
/// resolves exactly once — `Ok(())` on clean completion, the classified error
/// otherwise — and the item channel closes as soon as the producer stops for
/// any reason. Consumers should always await the terminal slot after draining
/// items.
///
/// Both waiting on the source and handing an item to the channel race the
/// cancellation token.
pub fn stream_decode<T, R>(
    token: &CancelToken,
    source: R,
) -> (
    mpsc::Receiver<T>,
    oneshot::Receiver<Result<(), ClassifiedError>>,
)
where
    T: DeserializeOwned + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    let (item_tx, item_rx) = mpsc::channel(STREAM_BUFFER);
    let (done_tx, done_rx) = oneshot::channel();
    let token = token.clone();

    tokio::spawn(async move {
        let result = stream_lines(&token, source, item_tx).await;
        // The consumer may have gone away without awaiting the slot.
        let _ = done_tx.send(result);
    });

    (item_rx, done_rx)
}

async fn stream_lines<T, R>(
    token: &CancelToken,
    source: R,
    items: mpsc::Sender<T>,
) -> Result<(), ClassifiedError>
where
    T: DeserializeOwned + Send + 'static,
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(source, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut line_number: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(token.error()),
            next = lines.next() => next,
        };

        let Some(next) = next else {
            return Ok(());
        };
        line_number += 1;

        let line = next.map_err(|e| read_failure(e, line_number))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: T =
            serde_json::from_str(trimmed).map_err(|e| decode_failure(e, line_number))?;

        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(token.error()),
            sent = items.send(record) => {
                if sent.is_err() {
                    // Consumer dropped the receiver; nothing left to produce for.
                    debug!(line = line_number, "stream consumer went away");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Item {
        id: i64,
        name: String,
    }

    #[test]
    fn test_recovery_mode_from_str() {
        assert_eq!("skip".parse::<RecoveryMode>().unwrap(), RecoveryMode::Skip);
        assert_eq!(
            "fail-fast".parse::<RecoveryMode>().unwrap(),
            RecoveryMode::FailFast
        );
        assert_eq!(
            "FailFast".parse::<RecoveryMode>().unwrap(),
            RecoveryMode::FailFast
        );
        assert!("abort".parse::<RecoveryMode>().is_err());
    }

    #[tokio::test]
    async fn test_blank_lines_are_silent_but_counted() {
        let input = "\n{\"id\":1,\"name\":\"a\"}\n   \n{\"id\":2,\"name\":\"b\"}\n\n";
        let token = CancelToken::new();

        let outcome = decode_with_recovery::<Item, _>(
            &token,
            Cursor::new(input),
            RecoveryMode::Skip,
            0,
        )
        .await;

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.errors.is_empty());
        assert!(outcome.skipped_lines.is_empty());
        assert_eq!(outcome.total_lines, 5);
    }

    #[tokio::test]
    async fn test_strict_decode_discards_partial_results() {
        let input = "{\"id\":1,\"name\":\"a\"}\nnot json\n{\"id\":2,\"name\":\"b\"}\n";
        let token = CancelToken::new();

        let err = decode_lines::<Item, _>(&token, Cursor::new(input))
            .await
            .unwrap_err();

        let classified = linehaul_common::find_classified(&err).unwrap();
        assert_eq!(classified.kind(), linehaul_common::ErrorKind::Skippable);
        assert!(classified.message().contains("line 2"));
    }
}
