//! Core types for the widget MVCC store: the widget record, its versioned
//! wrapper, the z-index key, the transaction log, error types, and
//! configuration.
//!
//! Everything here is data and bookkeeping; the lock manager that
//! orchestrates writers lives in `widget-concurrency`, and the store
//! orchestrator itself lives in the root crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod key;
pub mod transaction_log;
pub mod types;

pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{StoreError, StoreResult};
pub use key::{UniqueKey, UniqueKeyFactory};
pub use transaction_log::{TransactionLog, NO_SERIAL};
pub use types::{VersionStatus, VersionedWidget, Widget};
