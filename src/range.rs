//! The lazy, snapshot-scoped iterator returned by [`crate::MvccStore::range_by_z`].

use std::sync::Arc;

use widget_core::{TransactionLog, UniqueKey, VersionStatus, VersionedWidget, Widget};

use crate::store::SnapshotGuard;

/// Ascending, z-ordered, ACTIVE-only widget iterator.
///
/// Holds its originating snapshot (and, through it, the store's global
/// latch in shared mode) for as long as it's alive. There is no way to
/// observe items from this iterator without that snapshot being registered
/// first and released on drop — early `break`, panic, and simply letting it
/// fall out of scope all release it the same way.
pub struct RangeByZ<'a> {
    snapshot: SnapshotGuard<'a>,
    log: &'a TransactionLog,
    iter: Box<dyn Iterator<Item = (UniqueKey, Arc<VersionedWidget>)> + 'a>,
    remaining: usize,
}

impl<'a> RangeByZ<'a> {
    pub(crate) fn new(
        snapshot: SnapshotGuard<'a>,
        log: &'a TransactionLog,
        iter: Box<dyn Iterator<Item = (UniqueKey, Arc<VersionedWidget>)> + 'a>,
        limit: usize,
    ) -> Self {
        Self {
            snapshot,
            log,
            iter,
            remaining: limit,
        }
    }

    /// Release the snapshot and stop iterating. Equivalent to dropping the
    /// iterator, spelled out for callers who want the release to be
    /// explicit at the call site.
    pub fn close(self) {}
}

impl<'a> Iterator for RangeByZ<'a> {
    type Item = Widget;

    fn next(&mut self) -> Option<Widget> {
        if self.remaining == 0 {
            return None;
        }
        let snapshot = self.snapshot.serial();
        for (_, version) in self.iter.by_ref() {
            if let VersionStatus::Active = version.status(self.log, snapshot) {
                self.remaining -= 1;
                return Some(version.to_widget());
            }
        }
        None
    }
}
