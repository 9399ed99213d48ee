//! Retry with exponential backoff and jitter
//!
//! [`execute`] re-runs a fallible operation under a [`RetryPolicy`], but only
//! for failures the error taxonomy marks [`Retryable`](ErrorKind::Retryable).
//! Everything else — Fatal, Validation, Skippable, or plain unclassified
//! errors — short-circuits on the first failure. Cancellation always wins
//! over a pending retry, including mid-wait.
//!
//! Jitter perturbs each computed delay by ±10% so concurrent callers sharing
//! a policy do not retry in lockstep. Tests on jittered delays must assert
//! ranges, not exact values.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{is_kind, ErrorKind};

/// Default cap applied between attempts.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff growth factor.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Immutable configuration for one retry sequence.
///
/// A policy is built once (constructor, [`builder`](RetryPolicy::builder), or
/// deserialized from [`RetryConfig`]) and shared across any number of
/// [`execute`] invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries permitted after the initial attempt; 0 means try once.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
    /// Exponential growth factor, >= 1.
    pub multiplier: f64,
    /// Apply a ±10% uniform perturbation to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create a builder for fluent configuration.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Reject policies that cannot produce a sane backoff sequence.
    pub fn validate(&self) -> Result<()> {
        if self.multiplier < 1.0 {
            anyhow::bail!("retry multiplier must be >= 1.0, got {}", self.multiplier);
        }
        if self.initial_delay > self.max_delay {
            anyhow::bail!(
                "retry initial delay ({:?}) cannot exceed max delay ({:?})",
                self.initial_delay,
                self.max_delay
            );
        }
        Ok(())
    }

    /// Backoff delay for a zero-based attempt index.
    ///
    /// `min(initial_delay * multiplier^attempt, max_delay)`, then, with
    /// jitter enabled, a uniform ±10% adjustment re-clamped to
    /// `[0, max_delay]`. Without jitter the sequence is deterministic and
    /// monotonically non-decreasing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let max_secs = self.max_delay.as_secs_f64();
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(max_secs);

        let secs = if self.jitter {
            let factor = rand::rng().random_range(0.9..=1.1);
            (capped * factor).clamp(0.0, max_secs)
        } else {
            capped
        };

        Duration::from_secs_f64(secs)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.policy.initial_delay = initial_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.policy.max_delay = max_delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.policy.jitter = jitter;
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Flat, serializable form of a [`RetryPolicy`] for configuration files.
///
/// Durations are carried at millisecond granularity; conversion in either
/// direction is lossless at that granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryPolicy::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }
}

impl From<RetryPolicy> for RetryConfig {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_retries: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            multiplier: policy.multiplier,
            jitter: policy.jitter,
        }
    }
}

/// Execute `operation` under `policy`, retrying only Retryable failures.
///
/// The operation is any zero-argument fallible future factory; an operation
/// without a meaningful value uses `Result<()>`. On a non-Retryable failure
/// the error is returned as-is after the first attempt. Cancellation (or
/// deadline expiry) is checked before every attempt except the first and
/// races every backoff wait; when it fires, the token's error is returned
/// rather than the operation's last error.
pub async fn execute<T, F, Fut>(
    token: &CancelToken,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 && token.is_cancelled() {
            return Err(token.error().into());
        }

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_kind(&err, ErrorKind::Retryable) {
            return Err(err);
        }

        if attempt >= policy.max_attempts {
            debug!(attempt, "retry budget exhausted");
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed, backing off"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(token.error().into()),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}
