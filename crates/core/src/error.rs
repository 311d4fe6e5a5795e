//! Error types for the widget store.
//!
//! A single [`StoreError`] covers every fallible path exposed by the public
//! API. Lock-acquisition failures and invariant violations from the
//! concurrency layer are mapped into it at the call site rather than via a
//! blanket `From` impl, since the two live in separate crates.

use thiserror::Error;

/// Errors surfaced by the store's public operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The target widget id has no ACTIVE version under the caller's snapshot.
    #[error("widget not found")]
    NotFound,

    /// Lock acquisition exceeded the configured `transaction.timeout`.
    #[error("lock acquisition timed out")]
    Timeout,

    /// A constructor or config value was rejected (currently: non-positive
    /// `transaction.timeout`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An invariant the store relies on was violated. These are bugs, not
    /// user errors, and are logged at `error` level before being returned.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the store's public API.
pub type StoreResult<T> = Result<T, StoreError>;
