//! Widget records and their MVCC version wrapper.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::transaction_log::TransactionLog;

/// A widget as callers see it: plain data, no version bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Widget {
    /// Stable identifier, assigned by the store on creation.
    pub id: i32,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Stacking order; pairwise distinct among active widgets.
    pub z: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

/// Visibility of a [`VersionedWidget`] under a given snapshot serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// Superseded at or before the snapshot; an older version, if any, can't
    /// be active either — chain walks stop here.
    Expired,
    /// Created by a transaction that hasn't (yet, as far as this snapshot
    /// can tell) committed.
    NotYetCommitted,
    /// Visible: created at or before the snapshot, not yet superseded.
    Active,
}

const NONE_TID: i64 = -1;
const UNSET: i64 = -1;

/// One immutable-after-publish version of a widget.
///
/// `till_tid`/cached serials are the only fields ever mutated after
/// construction, and only once each, by the writer holding the relevant
/// id-lock. They're stored as `AtomicI64` with release/acquire ordering so
/// readers — which never take that lock — observe a consistent value or the
/// "unset" sentinel, in which case they fall back to the transaction log.
#[derive(Debug)]
pub struct VersionedWidget {
    /// Stable identifier shared by every version in this widget's chain.
    pub id: i32,
    /// Horizontal position as of this version.
    pub x: i32,
    /// Vertical position as of this version.
    pub y: i32,
    /// Stacking order as of this version.
    pub z: i32,
    /// Width as of this version.
    pub width: i32,
    /// Height as of this version.
    pub height: i32,
    from_tid: u64,
    till_tid: AtomicI64,
    from_serial: AtomicI64,
    till_serial: AtomicI64,
}

impl VersionedWidget {
    /// Construct a new version created by `from_tid`. `till_tid` starts
    /// unset (the widget is, as far as this version knows, current).
    pub fn new(id: i32, x: i32, y: i32, z: i32, width: i32, height: i32, from_tid: u64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            width,
            height,
            from_tid,
            till_tid: AtomicI64::new(NONE_TID),
            from_serial: AtomicI64::new(UNSET),
            till_serial: AtomicI64::new(UNSET),
        }
    }

    /// The transaction id that created this version.
    pub fn from_tid(&self) -> u64 {
        self.from_tid
    }

    /// The transaction id that superseded this version, if any.
    pub fn till_tid(&self) -> Option<u64> {
        match self.till_tid.load(Ordering::Acquire) {
            NONE_TID => None,
            tid => Some(tid as u64),
        }
    }

    /// Mark this version superseded by `tid`. Called exactly once, by the
    /// writer holding this widget's id-lock, before it commits.
    pub fn mark_superseded(&self, tid: u64) {
        self.till_tid.store(tid as i64, Ordering::Release);
    }

    /// Cache the commit serial for `from_tid`. Called exactly once,
    /// immediately after the creating transaction commits.
    pub fn cache_from_serial(&self, serial: i64) {
        self.from_serial.store(serial, Ordering::Release);
    }

    /// Cache the commit serial for `till_tid`. Called exactly once,
    /// immediately after the superseding transaction commits.
    pub fn cache_till_serial(&self, serial: i64) {
        self.till_serial.store(serial, Ordering::Release);
    }

    /// Resolve this version's visibility under snapshot `snapshot`,
    /// consulting `log` for any serial that hasn't been cached yet.
    pub fn status(&self, log: &TransactionLog, snapshot: i64) -> VersionStatus {
        if self.till_tid.load(Ordering::Acquire) != NONE_TID {
            if let Some(till_serial) = self.resolved_till_serial(log) {
                if till_serial <= snapshot {
                    return VersionStatus::Expired;
                }
            }
        }

        match self.resolved_from_serial(log) {
            Some(from_serial) if from_serial <= snapshot => VersionStatus::Active,
            _ => VersionStatus::NotYetCommitted,
        }
    }

    /// `from_serial`, resolving and caching it from the log if unset.
    fn resolved_from_serial(&self, log: &TransactionLog) -> Option<i64> {
        let cached = self.from_serial.load(Ordering::Acquire);
        if cached != UNSET {
            return Some(cached);
        }
        let resolved = log.serial_for(self.from_tid)?;
        self.from_serial.store(resolved, Ordering::Release);
        Some(resolved)
    }

    /// `till_serial`, resolving and caching it from the log if unset.
    /// Returns `None` if there is no `till_tid`, or it hasn't committed yet.
    fn resolved_till_serial(&self, log: &TransactionLog) -> Option<i64> {
        let till_tid = self.till_tid.load(Ordering::Acquire);
        if till_tid == NONE_TID {
            return None;
        }
        let cached = self.till_serial.load(Ordering::Acquire);
        if cached != UNSET {
            return Some(cached);
        }
        let resolved = log.serial_for(till_tid as u64)?;
        self.till_serial.store(resolved, Ordering::Release);
        Some(resolved)
    }

    /// Copy this version's fields into a plain [`Widget`].
    pub fn to_widget(&self) -> Widget {
        Widget {
            id: self.id,
            x: self.x,
            y: self.y,
            z: self.z,
            width: self.width,
            height: self.height,
        }
    }

    /// True if `x, y, z, width, height` match `other` field-by-field.
    /// Used by `update`'s no-op fast path.
    pub fn same_fields(&self, x: i32, y: i32, z: i32, width: i32, height: i32) -> bool {
        self.x == x && self.y == y && self.z == z && self.width == width && self.height == height
    }
}
