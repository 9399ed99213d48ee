//! Cooperative cancellation with an optional deadline
//!
//! Long-running operations (decode loops, streaming producers, backoff
//! waits) poll a [`CancelToken`] at well-defined suspension points: line
//! boundaries, before each retry attempt, while waiting out a backoff delay,
//! and while handing an item to a bounded channel. Cancellation is never
//! preemptive mid-decode.
//!
//! The token is a thin wrapper over `tokio_util`'s `CancellationToken` that
//! adds an optional deadline: the token fires on explicit
//! [`cancel`](CancelToken::cancel) or when the deadline passes, whichever
//! comes first. Clones share cancellation state.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ClassifiedError;

/// Cooperative cancellation signal, optionally deadline-bound.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only fires on explicit cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `timeout` has elapsed from now.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Trigger cancellation for this token and all of its clones.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancellation was requested or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolve when the token fires. Safe to await from multiple tasks.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// The classified error a cancelled operation returns to its caller.
    pub fn error(&self) -> ClassifiedError {
        if !self.token.is_cancelled() && self.deadline.is_some_and(|d| Instant::now() >= d) {
            ClassifiedError::fatal("deadline exceeded")
        } else {
            ClassifiedError::fatal("operation cancelled")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_clones_share_cancellation() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_counts_as_cancellation() {
        let token = CancelToken::with_deadline(Duration::from_secs(5));
        assert!(!token.is_cancelled());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(token.is_cancelled());
        assert_eq!(token.error().message(), "deadline exceeded");
    }

    #[tokio::test]
    async fn test_explicit_cancel_resolves_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();

        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("waiter should resolve promptly")
            .unwrap();

        assert_eq!(token.error().kind(), ErrorKind::Fatal);
        assert_eq!(token.error().message(), "operation cancelled");
    }

    #[tokio::test]
    async fn test_separate_tokens_are_independent() {
        let one = CancelToken::new();
        let two = CancelToken::new();

        one.cancel();
        assert!(!two.is_cancelled());
    }
}
