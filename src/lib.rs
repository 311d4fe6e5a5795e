//! # widgetstore
//!
//! An in-memory, snapshot-isolated store of `Widget` records, keyed by id
//! and ordered by a z-index that supports insert-with-shift at arbitrary
//! positions.
//!
//! Every read runs against a point-in-time snapshot: once a reader has its
//! commit serial, concurrent writes can neither appear nor disappear from
//! that read. Writers serialize against each other through a small set of
//! logical locks (per-id, per-z, and a single range lock) rather than one
//! global mutex, so unrelated writes proceed concurrently.
//!
//! # Quick start
//!
//! ```
//! use widgetstore::MvccStore;
//!
//! let store = MvccStore::default();
//! let widget = store.create(0, 0, 0, 10, 10);
//! assert_eq!(store.get_by_id(widget.id), Some(widget));
//!
//! // Inserting another widget at the same z shifts the first one up.
//! let top = store.create(0, 0, 0, 10, 10);
//! assert_eq!(store.get_by_id(widget.id).unwrap().z, 1);
//! assert_eq!(top.z, 0);
//! ```
//!
//! # Architecture
//!
//! [`MvccStore`] orchestrates four independent pieces: a transaction log
//! (`widget_core::TransactionLog`) that hands out the commit serials reads
//! and writes synchronize on; a versioned widget chain per id, held in a
//! `DashMap`; a z-ordered index of the same versions, held in a persistent
//! `im::OrdMap` so readers can clone it in O(1) and iterate lock-free; and a
//! logical write-lock manager (`widget_concurrency::LogicalWriteLocks`) that
//! gives writers the ordering (id, then z, then range) needed to shift
//! occupants without deadlocking each other.
//!
//! Only the types re-exported here are part of the public API; the
//! `widget-core` and `widget-concurrency` crates are implementation detail.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod range;
mod store;
mod vacuum;

pub use range::RangeByZ;
pub use store::{MvccStore, StoreStatus};
pub use widget_core::{StoreConfig, StoreConfigBuilder, StoreError, StoreResult, Widget};
