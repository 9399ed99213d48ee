//! Batch validation
//!
//! Partitions a collection of decoded records into the ones that pass their
//! own validation and an aggregated, index-tagged list of failures. The whole
//! batch is always traversed — a caller sees every problem in one pass, not
//! just the first.

use linehaul_common::ClassifiedError;
use tracing::debug;

/// Single-record validation capability.
///
/// Implemented by record types that can check their own field-level
/// invariants after decoding. Cross-field and relational checks are out of
/// scope here.
pub trait Validate {
    fn validate(&self) -> Result<(), ClassifiedError>;
}

/// Validate every item, preserving input order.
///
/// Valid items come back in their original relative order; each failure is
/// wrapped as a Validation error tagged `"item {i}: ..."` with the zero-based
/// index attached as context and the underlying error as cause. The two
/// partitions always add up to the input length.
pub fn validate_all<T: Validate>(items: Vec<T>) -> (Vec<T>, Vec<ClassifiedError>) {
    let total = items.len();
    let mut valid = Vec::with_capacity(total);
    let mut errors = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        match item.validate() {
            Ok(()) => valid.push(item),
            Err(err) => {
                errors.push(
                    ClassifiedError::validation(format!("item {}: {}", index, err.message()))
                        .caused_by(err)
                        .with_context("index", index),
                );
            }
        }
    }

    debug!(total, valid = valid.len(), invalid = errors.len(), "batch validated");
    (valid, errors)
}
