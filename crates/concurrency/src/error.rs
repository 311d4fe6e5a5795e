//! Errors raised by the logical write-lock manager.

use thiserror::Error;

/// Failure modes of [`crate::locks::LogicalWriteLocks`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyError {
    /// `lockZ`/`lockRange` did not acquire within the caller's timeout.
    /// Any locks taken earlier in the same call have already been released.
    #[error("lock acquisition timed out")]
    LockTimeout,
}
