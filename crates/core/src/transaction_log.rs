//! Assigns monotonically increasing commit serials to transaction ids.
//!
//! Commit is the serialization point for the whole store: the order serials
//! are handed out in is the order readers observe writes in.

use std::collections::HashMap;

use parking_lot::RwLock;

/// `tid -> serial` mapping plus the next serial to assign.
#[derive(Debug, Default)]
struct Inner {
    serials: HashMap<u64, i64>,
    next_serial: i64,
}

/// The transaction log.
///
/// `commit` takes the log's lock exclusively (it is the one mutating call);
/// `latest_serial` and `serial_for` only need a shared read.
#[derive(Debug, Default)]
pub struct TransactionLog {
    inner: RwLock<Inner>,
}

/// Sentinel returned by [`TransactionLog::latest_serial`] for an empty log.
pub const NO_SERIAL: i64 = -1;

impl TransactionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `tid` committed, returning its assigned serial.
    ///
    /// Returns `Err` if `tid` was already committed — a bug in the caller,
    /// since tids are single-use.
    pub fn commit(&self, tid: u64) -> Result<i64, String> {
        let mut inner = self.inner.write();
        if inner.serials.contains_key(&tid) {
            return Err(format!("transaction {tid} already committed"));
        }
        let serial = inner.next_serial;
        inner.serials.insert(tid, serial);
        inner.next_serial += 1;
        tracing::debug!(tid, serial, "committed transaction");
        Ok(serial)
    }

    /// The most recently assigned serial, or [`NO_SERIAL`] if nothing has
    /// committed yet.
    pub fn latest_serial(&self) -> i64 {
        self.inner.read().next_serial - 1
    }

    /// Look up the serial `tid` committed at, if it has committed.
    pub fn serial_for(&self, tid: u64) -> Option<i64> {
        self.inner.read().serials.get(&tid).copied()
    }

    /// Reset to a freshly constructed state.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.serials.clear();
        inner.next_serial = 0;
    }
}
