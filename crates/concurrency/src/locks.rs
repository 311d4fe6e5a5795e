//! Logical write-lock manager: id-locks, z-locks, and a single range-lock,
//! all serialized on one monitor.
//!
//! Callers acquire in a fixed order — id, then z (ascending), then range —
//! to avoid cycles between concurrent writers. `lockId` waits unboundedly
//! (ids don't collide across independent widgets often enough to need a
//! timeout); `lockZ`/`lockRange` take a finite timeout and return
//! [`ConcurrencyError::LockTimeout`] on expiry, releasing anything they
//! acquired earlier in the same call first.

use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::ConcurrencyError;

#[derive(Debug, Default)]
struct LockState {
    ids: HashSet<i32>,
    zs: BTreeSet<i32>,
    range: Option<i32>,
}

/// The lock manager. One instance per store.
#[derive(Debug, Default)]
pub struct LogicalWriteLocks {
    state: Mutex<LockState>,
    condvar: Condvar,
}

impl LogicalWriteLocks {
    /// Create an unlocked manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `id` is unlocked, then lock it. Unbounded wait.
    pub fn lock_id(&self, id: i32) {
        let mut state = self.state.lock();
        while state.ids.contains(&id) {
            self.condvar.wait(&mut state);
        }
        state.ids.insert(id);
    }

    /// Release `id`, waking any waiters.
    pub fn release_id(&self, id: i32) {
        let mut state = self.state.lock();
        state.ids.remove(&id);
        drop(state);
        self.condvar.notify_all();
    }

    /// Lock every value in `zs` (deduped, ascending order), each waiting
    /// until no range-lock covers it and it isn't already z-locked.
    ///
    /// On timeout, any values already acquired in this call are released
    /// before returning the error.
    pub fn lock_z(&self, zs: &[i32], timeout: Duration) -> Result<(), ConcurrencyError> {
        let mut sorted: Vec<i32> = zs.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let deadline = Instant::now() + timeout;
        let mut acquired: Vec<i32> = Vec::with_capacity(sorted.len());
        let mut state = self.state.lock();

        for z in sorted {
            loop {
                let not_covered = match state.range {
                    None => true,
                    Some(r) => z <= r,
                };
                if not_covered && !state.zs.contains(&z) {
                    state.zs.insert(z);
                    acquired.push(z);
                    break;
                }
                let now = Instant::now();
                if now >= deadline {
                    for held in &acquired {
                        state.zs.remove(held);
                    }
                    drop(state);
                    self.condvar.notify_all();
                    tracing::warn!(?zs, "lockZ timed out");
                    return Err(ConcurrencyError::LockTimeout);
                }
                self.condvar.wait_for(&mut state, deadline - now);
            }
        }
        Ok(())
    }

    /// Release every value in `zs`, waking any waiters.
    pub fn release_z(&self, zs: &[i32]) {
        let mut state = self.state.lock();
        for z in zs {
            state.zs.remove(z);
        }
        drop(state);
        self.condvar.notify_all();
    }

    /// Lock the range `[from_z, +inf)`, waiting until no range-lock is held
    /// and no z-lock above `from_z` is outstanding.
    pub fn lock_range(&self, from_z: i32, timeout: Duration) -> Result<(), ConcurrencyError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            let blocked_by_zs = state.zs.iter().any(|&z| z > from_z);
            if state.range.is_none() && !blocked_by_zs {
                state.range = Some(from_z);
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(from_z, "lockRange timed out");
                return Err(ConcurrencyError::LockTimeout);
            }
            self.condvar.wait_for(&mut state, deadline - now);
        }
    }

    /// Release the range-lock, waking any waiters.
    pub fn release_range(&self) {
        let mut state = self.state.lock();
        state.range = None;
        drop(state);
        self.condvar.notify_all();
    }

    /// Clear every lock. Only `clear` calls this.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.ids.clear();
        state.zs.clear();
        state.range = None;
        drop(state);
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_id_excludes_concurrent_lockers() {
        let locks = Arc::new(LogicalWriteLocks::new());
        locks.lock_id(1);
        let locks2 = Arc::clone(&locks);
        let handle = thread::spawn(move || {
            locks2.lock_id(1);
            locks2.release_id(1);
        });
        thread::sleep(Duration::from_millis(20));
        locks.release_id(1);
        handle.join().unwrap();
    }

    #[test]
    fn lock_z_dedupes_and_acquires_ascending() {
        let locks = LogicalWriteLocks::new();
        locks.lock_z(&[3, 1, 1, 2], Duration::from_millis(100)).unwrap();
        // all three distinct values should now be held
        locks.release_z(&[1, 2, 3]);
        locks.lock_z(&[1, 2, 3], Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn lock_z_times_out_and_releases_partial_acquisitions() {
        let locks = LogicalWriteLocks::new();
        locks.lock_z(&[5], Duration::from_millis(200)).unwrap();
        let err = locks.lock_z(&[1, 5], Duration::from_millis(20)).unwrap_err();
        assert_eq!(err, ConcurrencyError::LockTimeout);
        // z=1 must have been released even though it was acquired before the
        // timeout on z=5.
        locks.lock_z(&[1], Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn range_lock_waits_for_higher_z_locks_to_clear() {
        let locks = Arc::new(LogicalWriteLocks::new());
        locks.lock_z(&[10], Duration::from_millis(100)).unwrap();
        let locks2 = Arc::clone(&locks);
        let handle = thread::spawn(move || locks2.lock_range(5, Duration::from_millis(200)));
        thread::sleep(Duration::from_millis(20));
        locks.release_z(&[10]);
        assert!(handle.join().unwrap().is_ok());
        locks.release_range();
    }

    #[test]
    fn reset_clears_every_namespace() {
        let locks = LogicalWriteLocks::new();
        locks.lock_id(1);
        locks.lock_z(&[2], Duration::from_millis(100)).unwrap();
        locks.lock_range(0, Duration::from_millis(100)).unwrap();
        locks.reset();
        locks.lock_id(1);
        locks.lock_z(&[2], Duration::from_millis(100)).unwrap();
        locks.lock_range(0, Duration::from_millis(100)).unwrap();
    }
}
