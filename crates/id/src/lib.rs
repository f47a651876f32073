//! User identifiers and their generator.
//!
//! Users are addressed by short, human-readable tokens rather than UUIDs so they can be read
//! aloud or typed from a screen.
//!
//! ## Identifier form
//! - Characters: `0-9` and `A-Z` only (uppercase base-36)
//! - Freshly generated identifiers are 8 characters long, e.g. `SQU7QMTL`
//! - Fallback identifiers are a base-36 millisecond timestamp followed by a 3-character random
//!   suffix, e.g. `MGXK3Z1B0Q7F`
//!
//! Use [`UserId::parse`] to validate an externally supplied identifier.
//!
//! ## Uniqueness
//! [`IdGenerator`] keeps the set of identifiers currently in use. Every identifier it hands out
//! is reserved in that set before it is returned, so a caller holding `&mut IdGenerator` can
//! never receive a duplicate. Random tokens are retried up to [`MAX_ATTEMPTS`] times; after that
//! the generator switches to the timestamp form, which always terminates.

mod generator;

pub use generator::{IdGenerator, UserId, ID_LENGTH, MAX_ATTEMPTS};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The random source could not produce bytes
    #[error("random source unavailable: {0}")]
    RandomSource(#[source] rand::Error),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
