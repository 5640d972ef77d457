//! Defines error types.
use thiserror::Error;

/// Crate result type (re-exported),
pub type Result<T> = std::result::Result<T, Error>;

/// Error types.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// Ring must be able to hold at least one event.
    #[error("invalid ring capacity: {0}, must be at least 1")]
    InvalidCapacity(usize),
}

#[cold]
#[inline(never)]
pub(crate) const fn invalid_capacity(capacity: usize) -> Error {
    Error::InvalidCapacity(capacity)
}
