//! Linehaul Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared foundation for the Linehaul workspace members:
//!
//! - **Error Taxonomy**: classified errors that encode how a failure should
//!   be handled (abort, retry, report, skip)
//! - **Retry Engine**: exponential backoff with jitter, gated by the taxonomy
//! - **Cancellation**: a cooperative token with an optional deadline
//! - **Logging**: tracing subscriber setup shared by all binaries
//!
//! # Example
//!
//! ```no_run
//! use linehaul_common::{CancelToken, ClassifiedError, ErrorKind, RetryPolicy};
//! use linehaul_common::retry;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let token = CancelToken::new();
//! let policy = RetryPolicy::default();
//!
//! let value = retry::execute(&token, &policy, || async {
//!     Err::<u32, _>(ClassifiedError::retryable("transient blip").into())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod error;
pub mod logging;
pub mod retry;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use error::{find_classified, is_kind, ClassifiedError, ErrorKind};
pub use retry::{RetryConfig, RetryPolicy};
