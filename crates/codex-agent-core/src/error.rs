//! Error taxonomy template. Every downstream crate defines its own
//! `thiserror`-derived enum following this shape (named variants,
//! `#[from]` conversions, and an `is_recoverable()`-style helper where
//! that distinction matters to a caller) rather than importing a shared
//! catch-all type.

use thiserror::Error;

/// Data-model-level errors: validation failures that don't belong to any
/// one downstream crate's domain (e.g. a malformed bookmark passed across
/// a crate boundary before that crate's own error type applies).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,
}
