//! [`MvccStore`]: the orchestrator tying the primary index, the z-index, the
//! transaction log, and the lock manager together.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use widget_concurrency::LogicalWriteLocks;
use widget_core::{
    StoreConfig, StoreError, StoreResult, TransactionLog, UniqueKey, UniqueKeyFactory,
    VersionStatus, VersionedWidget, Widget,
};

use crate::range::RangeByZ;

/// An in-memory MVCC store of [`Widget`] records, keyed by id, ordered by z.
///
/// Reads take the global latch in shared mode and never contend with other
/// readers; writers also take the shared side and coordinate amongst
/// themselves via [`LogicalWriteLocks`]. Only [`MvccStore::clear`] takes the
/// latch exclusively, as a global barrier.
pub struct MvccStore {
    config: StoreConfig,
    pub(crate) primary: DashMap<i32, im::Vector<Arc<VersionedWidget>>>,
    pub(crate) z_index: RwLock<im::OrdMap<UniqueKey, Arc<VersionedWidget>>>,
    pub(crate) log: TransactionLog,
    locks: LogicalWriteLocks,
    key_factory: UniqueKeyFactory,
    pub(crate) latch: RwLock<()>,
    next_id: AtomicI32,
    next_tid: AtomicU64,
    pub(crate) live_snapshots: Mutex<BTreeMap<i64, u32>>,
}

/// A cheap, lock-light snapshot of the store's size for observability.
#[derive(Debug, Clone, Copy)]
pub struct StoreStatus {
    /// Number of widgets currently visible (see [`MvccStore::size`]).
    pub widget_count: i32,
    /// Number of reader snapshots currently outstanding.
    pub live_snapshot_count: u32,
    /// The most recently assigned commit serial.
    pub latest_serial: i64,
}

impl MvccStore {
    /// Construct a store from `config`.
    pub fn new(config: StoreConfig) -> Self {
        let capacity = config.initial_capacity();
        Self {
            primary: DashMap::with_capacity(capacity),
            z_index: RwLock::new(im::OrdMap::new()),
            log: TransactionLog::new(),
            locks: LogicalWriteLocks::new(),
            key_factory: UniqueKeyFactory::new(),
            latch: RwLock::new(()),
            next_id: AtomicI32::new(0),
            next_tid: AtomicU64::new(0),
            live_snapshots: Mutex::new(BTreeMap::new()),
            config,
        }
    }

    /// A cheap status snapshot: widget count, outstanding reader snapshots,
    /// and the latest commit serial.
    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            widget_count: self.size(),
            live_snapshot_count: self.live_snapshots.lock().values().sum(),
            latest_serial: self.log.latest_serial(),
        }
    }

    // ---- read operations -------------------------------------------------

    /// The newest ACTIVE version of `id` under a fresh snapshot, or `None`.
    pub fn get_by_id(&self, id: i32) -> Option<Widget> {
        let snapshot = self.begin_snapshot();
        let s = snapshot.serial();
        let chain = self.primary.get(&id)?.value().clone();
        for version in chain.iter().rev() {
            match version.status(&self.log, s) {
                VersionStatus::Active => return Some(version.to_widget()),
                VersionStatus::Expired => return None,
                VersionStatus::NotYetCommitted => continue,
            }
        }
        None
    }

    /// Lazily iterate ACTIVE widgets starting at `from_z`, ascending, up to
    /// `limit` items. The returned iterator holds the snapshot and the
    /// global latch until it is fully drained, dropped, or explicitly
    /// [`RangeByZ::close`]d.
    pub fn range_by_z(&self, from_z: i32, limit: i32) -> RangeByZ<'_> {
        let snapshot = self.begin_snapshot();
        let lower = UniqueKey::lower_bound(from_z);
        let ordered = self.z_index.read().clone();
        let iter = ordered.into_iter().skip_while(move |(k, _)| *k < lower);
        RangeByZ::new(snapshot, &self.log, Box::new(iter), limit.max(0) as usize)
    }

    /// Count of widget ids whose newest-first chain walk yields ACTIVE
    /// before EXPIRED.
    pub fn size(&self) -> i32 {
        let snapshot = self.begin_snapshot();
        let s = snapshot.serial();
        let mut count = 0i32;
        for entry in self.primary.iter() {
            for version in entry.value().iter().rev() {
                match version.status(&self.log, s) {
                    VersionStatus::Active => {
                        count += 1;
                        break;
                    }
                    VersionStatus::Expired => break,
                    VersionStatus::NotYetCommitted => continue,
                }
            }
        }
        count
    }

    // ---- write operations -------------------------------------------------

    /// Create a widget at the given z, shifting `z` and everything above it
    /// up by one if `z` is occupied.
    ///
    /// Infallible: the lock timeout is retried internally rather than
    /// surfaced, since `create` has no error path in the public contract
    /// (see DESIGN.md).
    pub fn create(&self, x: i32, y: i32, z: i32, width: i32, height: i32) -> Widget {
        let _latch = self.latch.read();
        let tid = self.allocate_tid();
        let new_id = self.allocate_id();

        self.locks.lock_id(new_id);
        self.lock_z_blocking(&[z]);

        let new_version = Arc::new(VersionedWidget::new(new_id, x, y, z, width, height, tid));
        self.append_version(new_id, Arc::clone(&new_version));
        self.insert_z_entry(self.key_factory.next_key(z), Arc::clone(&new_version));

        let needs_shift = self.other_active_exists_at(z);
        let (shifted_ids, shifted_pairs) = if needs_shift {
            self.lock_range_blocking(z);
            self.shift_occupants_from(z, tid, Some(new_id))
        } else {
            (Vec::new(), Vec::new())
        };

        let serial = self
            .log
            .commit(tid)
            .expect("tid allocated exclusively by this store");
        new_version.cache_from_serial(serial);
        for (old, new) in &shifted_pairs {
            old.cache_till_serial(serial);
            new.cache_from_serial(serial);
        }

        if needs_shift {
            self.locks.release_range();
        }
        self.locks.release_z(&[z]);
        self.locks.release_id(new_id);
        for id in shifted_ids {
            self.locks.release_id(id);
        }

        new_version.to_widget()
    }

    /// Create a widget at `maxActiveZ + 1` (0 if the store is empty). Never
    /// shifts anything, but blocks all other writers while it scans for the
    /// current maximum.
    pub fn create_at_top(&self, x: i32, y: i32, width: i32, height: i32) -> Widget {
        let _latch = self.latch.read();
        let tid = self.allocate_tid();
        let new_id = self.allocate_id();

        // newId is freshly allocated and cannot collide; kept for symmetry
        // with the rest of the lock-ordering discipline (see DESIGN.md).
        self.locks.lock_id(new_id);
        self.lock_z_blocking(&[i32::MIN]);
        self.lock_range_blocking(i32::MIN);

        let target_z = self.max_active_z().map(|z| z + 1).unwrap_or(0);

        let new_version = Arc::new(VersionedWidget::new(
            new_id, x, y, target_z, width, height, tid,
        ));
        self.append_version(new_id, Arc::clone(&new_version));
        self.insert_z_entry(self.key_factory.next_key(target_z), Arc::clone(&new_version));

        let serial = self
            .log
            .commit(tid)
            .expect("tid allocated exclusively by this store");
        new_version.cache_from_serial(serial);

        self.locks.release_range();
        self.locks.release_z(&[i32::MIN]);
        self.locks.release_id(new_id);

        new_version.to_widget()
    }

    /// Update `id` to the given fields, shifting `z` and above if the new
    /// `z` is occupied by a different widget.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `id` has no ACTIVE version;
    /// [`StoreError::Timeout`] if a lock could not be acquired in time.
    pub fn update(
        &self,
        id: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
    ) -> StoreResult<Widget> {
        let _latch = self.latch.read();
        let tid = self.allocate_tid();

        self.locks.lock_id(id);
        let old_version = match self.newest_active(id) {
            Some(v) => v,
            None => {
                self.locks.release_id(id);
                return Err(StoreError::NotFound);
            }
        };

        if old_version.same_fields(x, y, z, width, height) {
            self.locks.release_id(id);
            return Ok(old_version.to_widget());
        }

        let old_z = old_version.z;
        let timeout = self.config.transaction_timeout();
        let mut zs = vec![z, old_z];
        zs.sort_unstable();
        zs.dedup();
        if self.locks.lock_z(&zs, timeout).is_err() {
            self.locks.release_id(id);
            return Err(StoreError::Timeout);
        }

        let needs_shift = z != old_z && self.other_active_exists_at(z);
        let range_held = if needs_shift {
            if self.locks.lock_range(z, timeout).is_err() {
                self.locks.release_z(&zs);
                self.locks.release_id(id);
                return Err(StoreError::Timeout);
            }
            true
        } else {
            false
        };

        let (shifted_ids, shifted_pairs) = if range_held {
            self.shift_occupants_from(z, tid, Some(id))
        } else {
            (Vec::new(), Vec::new())
        };

        old_version.mark_superseded(tid);
        let new_version = Arc::new(VersionedWidget::new(id, x, y, z, width, height, tid));
        self.append_version(id, Arc::clone(&new_version));
        self.insert_z_entry(self.key_factory.next_key(z), Arc::clone(&new_version));

        let serial = self
            .log
            .commit(tid)
            .expect("tid allocated exclusively by this store");
        old_version.cache_till_serial(serial);
        new_version.cache_from_serial(serial);
        for (old, new) in &shifted_pairs {
            old.cache_till_serial(serial);
            new.cache_from_serial(serial);
        }

        if range_held {
            self.locks.release_range();
        }
        self.locks.release_z(&zs);
        self.locks.release_id(id);
        for sid in shifted_ids {
            self.locks.release_id(sid);
        }

        Ok(new_version.to_widget())
    }

    /// Move `id` to `maxActiveZ + 1`, unless it's already there.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `id` has no ACTIVE version;
    /// [`StoreError::Timeout`] if a lock could not be acquired in time.
    pub fn update_to_top(
        &self,
        id: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> StoreResult<Widget> {
        let _latch = self.latch.read();
        let tid = self.allocate_tid();

        self.locks.lock_id(id);
        let old_version = match self.newest_active(id) {
            Some(v) => v,
            None => {
                self.locks.release_id(id);
                return Err(StoreError::NotFound);
            }
        };

        let timeout = self.config.transaction_timeout();
        if self.locks.lock_z(&[i32::MIN], timeout).is_err() {
            self.locks.release_id(id);
            return Err(StoreError::Timeout);
        }
        if self.locks.lock_range(i32::MIN, timeout).is_err() {
            self.locks.release_z(&[i32::MIN]);
            self.locks.release_id(id);
            return Err(StoreError::Timeout);
        }

        let max_z = self.max_active_z().unwrap_or(-1);
        let target_z = max_z + 1;
        let old_z = old_version.z;
        let new_z = if old_z + 1 == target_z { old_z } else { target_z };

        let result = if old_version.same_fields(x, y, new_z, width, height) {
            old_version.to_widget()
        } else {
            old_version.mark_superseded(tid);
            let new_version = Arc::new(VersionedWidget::new(id, x, y, new_z, width, height, tid));
            self.append_version(id, Arc::clone(&new_version));
            self.insert_z_entry(self.key_factory.next_key(new_z), Arc::clone(&new_version));

            let serial = self
                .log
                .commit(tid)
                .expect("tid allocated exclusively by this store");
            old_version.cache_till_serial(serial);
            new_version.cache_from_serial(serial);
            new_version.to_widget()
        };

        self.locks.release_range();
        self.locks.release_z(&[i32::MIN]);
        self.locks.release_id(id);

        Ok(result)
    }

    /// Delete the newest ACTIVE version of `id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `id` has no ACTIVE version;
    /// [`StoreError::Timeout`] if a lock could not be acquired in time.
    pub fn delete(&self, id: i32) -> StoreResult<()> {
        let _latch = self.latch.read();
        let tid = self.allocate_tid();

        self.locks.lock_id(id);
        let old_version = match self.newest_active(id) {
            Some(v) => v,
            None => {
                self.locks.release_id(id);
                return Err(StoreError::NotFound);
            }
        };

        let timeout = self.config.transaction_timeout();
        if self.locks.lock_z(&[old_version.z], timeout).is_err() {
            self.locks.release_id(id);
            return Err(StoreError::Timeout);
        }

        old_version.mark_superseded(tid);
        let serial = self
            .log
            .commit(tid)
            .expect("tid allocated exclusively by this store");
        old_version.cache_till_serial(serial);

        self.locks.release_z(&[old_version.z]);
        self.locks.release_id(id);

        Ok(())
    }

    /// Reset the store to a freshly constructed state. Takes the global
    /// latch exclusively, as a barrier against every other operation.
    pub fn clear(&self) {
        let _latch = self.latch.write();
        self.primary.clear();
        *self.z_index.write() = im::OrdMap::new();
        self.log.clear();
        self.locks.reset();
        self.key_factory.reset();
        self.next_id.store(0, Ordering::SeqCst);
        self.next_tid.store(0, Ordering::SeqCst);
        self.live_snapshots.lock().clear();
    }

    // ---- internal helpers --------------------------------------------------

    fn allocate_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn allocate_tid(&self) -> u64 {
        self.next_tid.fetch_add(1, Ordering::SeqCst)
    }

    fn append_version(&self, id: i32, version: Arc<VersionedWidget>) {
        let mut chain = self.primary.entry(id).or_insert_with(im::Vector::new);
        chain.push_back(version);
    }

    fn insert_z_entry(&self, key: UniqueKey, version: Arc<VersionedWidget>) {
        self.z_index.write().insert(key, version);
    }

    fn newest_active(&self, id: i32) -> Option<Arc<VersionedWidget>> {
        let chain = self.primary.get(&id)?.value().clone();
        let snapshot = self.log.latest_serial();
        for version in chain.iter().rev() {
            match version.status(&self.log, snapshot) {
                VersionStatus::Active => return Some(Arc::clone(version)),
                VersionStatus::Expired => return None,
                VersionStatus::NotYetCommitted => continue,
            }
        }
        None
    }

    fn other_active_exists_at(&self, z: i32) -> bool {
        let snapshot = self.log.latest_serial();
        self.z_index
            .read()
            .iter()
            .any(|(k, v)| k.z() == z && matches!(v.status(&self.log, snapshot), VersionStatus::Active))
    }

    fn max_active_z(&self) -> Option<i32> {
        let snapshot = self.log.latest_serial();
        self.z_index
            .read()
            .iter()
            .filter(|(_, v)| matches!(v.status(&self.log, snapshot), VersionStatus::Active))
            .map(|(k, _)| k.z())
            .max()
    }

    /// Shift every ACTIVE version with `z >= from_z` (other than
    /// `exclude_id`) up by one, acquiring each shifted widget's id-lock.
    /// Caller must already hold the range-lock at `from_z`.
    fn shift_occupants_from(
        &self,
        from_z: i32,
        tid: u64,
        exclude_id: Option<i32>,
    ) -> (Vec<i32>, Vec<(Arc<VersionedWidget>, Arc<VersionedWidget>)>) {
        let snapshot = self.log.latest_serial();
        let mut occupants: Vec<(UniqueKey, Arc<VersionedWidget>)> = self
            .z_index
            .read()
            .iter()
            .filter(|(k, v)| {
                k.z() >= from_z
                    && Some(v.id) != exclude_id
                    && matches!(v.status(&self.log, snapshot), VersionStatus::Active)
            })
            .map(|(k, v)| (*k, Arc::clone(v)))
            .collect();
        occupants.sort_by_key(|(k, _)| *k);

        let mut shifted_ids = Vec::with_capacity(occupants.len());
        let mut pairs = Vec::with_capacity(occupants.len());
        for (_, occupant) in occupants {
            self.locks.lock_id(occupant.id);
            shifted_ids.push(occupant.id);
            occupant.mark_superseded(tid);
            let new_version = Arc::new(VersionedWidget::new(
                occupant.id,
                occupant.x,
                occupant.y,
                occupant.z + 1,
                occupant.width,
                occupant.height,
                tid,
            ));
            self.append_version(occupant.id, Arc::clone(&new_version));
            self.insert_z_entry(
                self.key_factory.next_key(occupant.z + 1),
                Arc::clone(&new_version),
            );
            pairs.push((occupant, new_version));
        }
        (shifted_ids, pairs)
    }

    /// `create`/`createAtTop` have no error path in the public contract, so
    /// their lock acquisitions retry on timeout rather than surfacing it.
    fn lock_z_blocking(&self, zs: &[i32]) {
        let timeout = self.config.transaction_timeout();
        while self.locks.lock_z(zs, timeout).is_err() {
            tracing::warn!(?zs, "create retrying lockZ after timeout");
        }
    }

    fn lock_range_blocking(&self, from_z: i32) {
        let timeout = self.config.transaction_timeout();
        while self.locks.lock_range(from_z, timeout).is_err() {
            tracing::warn!(from_z, "create retrying lockRange after timeout");
        }
    }

    pub(crate) fn begin_snapshot(&self) -> SnapshotGuard<'_> {
        let latch = self.latch.read();
        let serial = self.log.latest_serial();
        *self.live_snapshots.lock().entry(serial).or_insert(0) += 1;
        SnapshotGuard {
            store: self,
            _latch: latch,
            serial,
        }
    }

    fn release_snapshot(&self, serial: i64) {
        let mut snapshots = self.live_snapshots.lock();
        if let Some(count) = snapshots.get_mut(&serial) {
            *count -= 1;
            if *count == 0 {
                snapshots.remove(&serial);
            }
        }
    }

}

impl Default for MvccStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Holds the global latch (shared mode) and a live-snapshot registration for
/// the duration of one read. Releases both on drop, including on early
/// return or panic — there is no path that observes a snapshot without
/// eventually releasing it.
pub(crate) struct SnapshotGuard<'a> {
    store: &'a MvccStore,
    _latch: RwLockReadGuard<'a, ()>,
    serial: i64,
}

impl<'a> SnapshotGuard<'a> {
    pub(crate) fn serial(&self) -> i64 {
        self.serial
    }
}

impl<'a> Drop for SnapshotGuard<'a> {
    fn drop(&mut self) {
        self.store.release_snapshot(self.serial);
    }
}
