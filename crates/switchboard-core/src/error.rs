//! Error types for the state core.
//!
//! Reducers never fail: an event that cannot apply is a no-op. The only
//! errors surfaced from this crate are contract violations in the values a
//! caller hands in, such as an identifier that cannot name anybody.

use thiserror::Error;

/// Errors raised by the state core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A raw identifier was empty or whitespace.
    #[error("empty identifier")]
    EmptyIdentifier,

    /// A raw identifier carried a known prefix but no value after it.
    #[error("identifier {raw:?} has prefix {prefix:?} but no value")]
    MissingIdentifierValue {
        /// Raw identifier as received.
        raw: String,
        /// Prefix that was recognized.
        prefix: &'static str,
    },
}
