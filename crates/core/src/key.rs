//! The z-index's unique key: `(z, tiebreaker)`.
//!
//! The z-index needs to hold two entries at the same `z` transiently while a
//! range shift is in flight (the outgoing version and its successor). A plain
//! `z`-keyed map can't do that, so the index is keyed on a synthetic pair
//! instead — a design choice, not a workaround.

use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered key for the z-index: orders by `z` first, then by `tiebreaker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueKey {
    z: i32,
    tiebreaker: u64,
}

impl UniqueKey {
    /// Build a key for a freshly minted version.
    pub fn new(z: i32, tiebreaker: u64) -> Self {
        Self { z, tiebreaker }
    }

    /// The smallest possible key at `z`, for range scans starting at `z`.
    pub fn lower_bound(z: i32) -> Self {
        Self {
            z,
            tiebreaker: u64::MIN,
        }
    }

    /// The z value this key was minted for.
    pub fn z(&self) -> i32 {
        self.z
    }
}

/// Mints monotonically increasing tiebreakers for [`UniqueKey`].
#[derive(Debug, Default)]
pub struct UniqueKeyFactory {
    next: AtomicU64,
}

impl UniqueKeyFactory {
    /// Create a fresh factory starting at tiebreaker 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next key for `z`.
    pub fn next_key(&self, z: i32) -> UniqueKey {
        let tiebreaker = self.next.fetch_add(1, Ordering::Relaxed);
        UniqueKey::new(z, tiebreaker)
    }

    /// Reset the tiebreaker sequence. Only `clear` calls this.
    pub fn reset(&self) {
        self.next.store(0, Ordering::Relaxed);
    }
}
