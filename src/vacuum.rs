//! Reclaims EXPIRED versions behind the oldest outstanding reader snapshot.

use std::sync::Arc;

use widget_core::VersionedWidget;

use crate::store::MvccStore;

impl MvccStore {
    /// Remove every version superseded at or before the vacuum barrier (the
    /// oldest live reader snapshot, or the latest commit serial if no
    /// readers are outstanding) from both the primary index and the
    /// z-index. Widget ids left with no remaining versions are dropped
    /// from the primary index entirely.
    ///
    /// Read-only with respect to version bookkeeping: this never calls
    /// `cache_from_serial`/`cache_till_serial`, since those are the
    /// exclusive province of the writer that owns the relevant id-lock.
    pub fn vacuum(&self) {
        let _latch = self.latch.read();
        let barrier = self.vacuum_barrier();
        tracing::debug!(barrier, "vacuum pass starting");

        let mut emptied_ids = Vec::new();
        for mut entry in self.primary.iter_mut() {
            let id = *entry.key();
            let retained: im::Vector<Arc<VersionedWidget>> = entry
                .value()
                .iter()
                .filter(|v| !self.is_reclaimable(v, barrier))
                .cloned()
                .collect();
            if retained.is_empty() {
                emptied_ids.push(id);
            } else {
                *entry.value_mut() = retained;
            }
        }
        for id in &emptied_ids {
            self.primary.remove(id);
        }

        let mut z_index = self.z_index.write();
        let reclaimable: Vec<_> = z_index
            .iter()
            .filter(|(_, v)| self.is_reclaimable(v, barrier))
            .map(|(k, _)| *k)
            .collect();
        let removed = reclaimable.len();
        for key in reclaimable {
            z_index.remove(&key);
        }
        drop(z_index);

        tracing::debug!(
            barrier,
            emptied_ids = emptied_ids.len(),
            removed_z_entries = removed,
            "vacuum pass complete"
        );
    }

    fn is_reclaimable(&self, version: &VersionedWidget, barrier: i64) -> bool {
        match version.till_tid() {
            None => false,
            Some(till_tid) => match self.log.serial_for(till_tid) {
                Some(till_serial) => till_serial <= barrier,
                None => false,
            },
        }
    }

    fn vacuum_barrier(&self) -> i64 {
        match self.live_snapshots.lock().keys().next() {
            Some(&min) => min,
            None => self.log.latest_serial(),
        }
    }
}
