//! Classified error types for Linehaul
//!
//! Every failure in the ingestion core carries one of four kinds that tells
//! callers how to handle it:
//!
//! - [`ErrorKind::Fatal`]: unrecoverable (unreadable source, exceeded error
//!   threshold, cancellation) — terminate the enclosing operation
//! - [`ErrorKind::Retryable`]: transient (network blip, lock contention) —
//!   eligible for the retry engine
//! - [`ErrorKind::Validation`]: well-formed but semantically invalid input —
//!   surface to the caller, never retry
//! - [`ErrorKind::Skippable`]: an isolated bad record — safe to drop and
//!   continue, counted against any configured error budget
//!
//! The retry engine and the streaming parser make their policy decisions by
//! testing kinds through the error chain ([`is_kind`]), never by matching on
//! error text.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Classification of a failure, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unrecoverable; terminates the enclosing operation.
    Fatal,
    /// Transient; eligible for retry with backoff.
    Retryable,
    /// Semantically invalid input; reported, never retried.
    Validation,
    /// Isolated bad record; safe to drop and continue.
    Skippable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fatal => "Fatal",
            ErrorKind::Retryable => "Retryable",
            ErrorKind::Validation => "Validation",
            ErrorKind::Skippable => "Skippable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error carrying a fixed [`ErrorKind`], an optional wrapped cause, and an
/// insertion-ordered context map for diagnostic attachments.
///
/// Constructed at the failure site with one constructor per kind, then
/// enriched through chained [`with_context`](ClassifiedError::with_context)
/// calls:
///
/// ```
/// use linehaul_common::ClassifiedError;
///
/// let err = ClassifiedError::skippable("invalid JSON on line 42")
///     .with_context("line", 42)
///     .with_context("file", "items.jsonl");
/// ```
#[derive(Debug)]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    context: IndexMap<String, serde_json::Value>,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            context: IndexMap::new(),
        }
    }

    /// An unrecoverable failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// A transient failure worth retrying.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Retryable, message)
    }

    /// A semantic validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// An isolated, droppable failure.
    pub fn skippable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Skippable, message)
    }

    /// Attach the underlying error this one wraps.
    pub fn caused_by(
        mut self,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Attach a diagnostic key/value pair and return the same error, so calls
    /// can be chained at the failure site. Re-inserting a key overwrites its
    /// value but keeps the original position.
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// The kind assigned at construction; immutable for the error's lifetime.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message, without kind prefix or cause.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The diagnostic context map, in insertion order. Empty unless populated.
    pub fn context(&self) -> &IndexMap<String, serde_json::Value> {
        &self.context
    }

    /// True if this error's own kind matches.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "[{}] {}: {}", self.kind, self.message, cause),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ClassifiedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

/// Equality is kind + message; cause and context are deliberately excluded so
/// an enriched error still compares equal to its bare construction.
impl PartialEq for ClassifiedError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for ClassifiedError {}

/// Find the first [`ClassifiedError`] anywhere in an error chain.
///
/// Walks the chain one cause at a time; a chain containing no classified
/// error returns `None` rather than failing.
pub fn find_classified(err: &anyhow::Error) -> Option<&ClassifiedError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ClassifiedError>())
}

/// Test whether an error chain contains a classified error of `kind`.
///
/// Plain, unclassified errors always yield `false`.
pub fn is_kind(err: &anyhow::Error, kind: ErrorKind) -> bool {
    find_classified(err).is_some_and(|classified| classified.kind() == kind)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ALL_KINDS: [ErrorKind; 4] = [
        ErrorKind::Fatal,
        ErrorKind::Retryable,
        ErrorKind::Validation,
        ErrorKind::Skippable,
    ];

    fn classify(kind: ErrorKind, message: &str) -> ClassifiedError {
        match kind {
            ErrorKind::Fatal => ClassifiedError::fatal(message),
            ErrorKind::Retryable => ClassifiedError::retryable(message),
            ErrorKind::Validation => ClassifiedError::validation(message),
            ErrorKind::Skippable => ClassifiedError::skippable(message),
        }
    }

    #[test]
    fn test_display_without_cause() {
        let err = ClassifiedError::fatal("source unreadable");
        assert_eq!(err.to_string(), "[Fatal] source unreadable");
    }

    #[test]
    fn test_display_with_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = ClassifiedError::fatal("source unreadable").caused_by(io);
        assert_eq!(err.to_string(), "[Fatal] source unreadable: disk gone");
    }

    #[test]
    fn test_kind_round_trip_for_every_kind() {
        for kind in ALL_KINDS {
            let err: anyhow::Error = classify(kind, "m").into();
            assert!(is_kind(&err, kind), "{kind} should match itself");
            for other in ALL_KINDS {
                if other != kind {
                    assert!(!is_kind(&err, other), "{kind} should not match {other}");
                }
            }
        }
    }

    #[test]
    fn test_kind_survives_outer_wrapping() {
        for kind in ALL_KINDS {
            let err: anyhow::Error = classify(kind, "m").into();
            let wrapped = err.context("while loading batch 7");
            assert!(is_kind(&wrapped, kind));
        }
    }

    #[test]
    fn test_unclassified_error_is_no_kind() {
        let err = anyhow::anyhow!("plain error");
        for kind in ALL_KINDS {
            assert!(!is_kind(&err, kind));
        }
        assert!(find_classified(&err).is_none());
    }

    #[test]
    fn test_equality_ignores_cause_and_context() {
        let bare = ClassifiedError::retryable("connection reset");
        let enriched = ClassifiedError::retryable("connection reset")
            .caused_by(std::io::Error::new(std::io::ErrorKind::Other, "x"))
            .with_context("host", "db-1");
        assert_eq!(bare, enriched);

        assert_ne!(bare, ClassifiedError::retryable("other message"));
        assert_ne!(bare, ClassifiedError::fatal("connection reset"));
    }

    #[test]
    fn test_context_preserves_insertion_order_and_uniqueness() {
        let err = ClassifiedError::skippable("bad line")
            .with_context("file", "a.jsonl")
            .with_context("line", 12)
            .with_context("file", "b.jsonl");

        let keys: Vec<&str> = err.context().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["file", "line"]);
        assert_eq!(err.context()["file"], serde_json::json!("b.jsonl"));
    }

    #[test]
    fn test_source_exposes_cause_chain() {
        let inner = ClassifiedError::skippable("inner");
        let outer = ClassifiedError::fatal("outer").caused_by(inner);

        let source = std::error::Error::source(&outer).unwrap();
        let classified = source.downcast_ref::<ClassifiedError>().unwrap();
        assert_eq!(classified.kind(), ErrorKind::Skippable);

        // The inner classified error is the first one found when walking from
        // an anyhow wrapper around the outer error's cause chain.
        let err: anyhow::Error = outer.into();
        assert_eq!(
            find_classified(&err).unwrap().kind(),
            ErrorKind::Fatal,
            "chain walk returns the outermost classified error first"
        );
    }
}
