//! Conformance tests against the store's testable properties.
//!
//! Organized the way the spec documents them: per-operation invariants,
//! then the literal end-to-end scenarios (S1-S6).

use widgetstore::{MvccStore, StoreError};

fn fresh() -> MvccStore {
    MvccStore::default()
}

mod invariants {
    use super::*;

    /// Invariant 2: z-uniqueness under snapshots. ACTIVE versions never
    /// share a z value at any point between operations.
    #[test]
    fn z_values_are_pairwise_distinct_after_every_write() {
        let store = fresh();
        let a = store.create(0, 0, 1, 1, 1);
        let b = store.create(0, 0, 1, 1, 1); // collides with a, shifts it
        let c = store.create(0, 0, 1, 1, 1); // collides with b, shifts a and b

        let zs: Vec<i32> = store.range_by_z(i32::MIN, 10).map(|w| w.z).collect();
        let mut sorted = zs.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(zs.len(), sorted.len(), "duplicate z in {zs:?}");
        assert_eq!(store.get_by_id(c.id).unwrap().z, 1);
        assert_eq!(store.get_by_id(b.id).unwrap().z, 2);
        assert_eq!(store.get_by_id(a.id).unwrap().z, 3);
    }

    /// Invariant 3: id-uniqueness under snapshots. At most one ACTIVE
    /// version per id — an update never leaves two chain entries visible.
    #[test]
    fn at_most_one_active_version_per_id() {
        let store = fresh();
        let w = store.create(1, 1, 0, 2, 2);
        store.update(w.id, 5, 5, 0, 2, 2).unwrap();
        store.update(w.id, 9, 9, 0, 2, 2).unwrap();
        assert_eq!(store.size(), 1);
        let current = store.get_by_id(w.id).unwrap();
        assert_eq!((current.x, current.y), (9, 9));
    }

    /// Invariant 6: `rangeByZ` paging. Concatenating pages with
    /// `from = last.z + 1` and no concurrent writes yields every ACTIVE
    /// widget in ascending order exactly once.
    #[test]
    fn range_by_z_pages_without_gaps_or_duplicates() {
        let store = fresh();
        for z in 0..9 {
            store.create_at_top(z, z, 1, 1);
        }

        let mut seen = Vec::new();
        let mut from = i32::MIN;
        loop {
            let page: Vec<_> = store.range_by_z(from, 4).collect();
            if page.is_empty() {
                break;
            }
            from = page.last().unwrap().z + 1;
            seen.extend(page.into_iter().map(|w| w.z));
        }
        assert_eq!(seen, (0..9).collect::<Vec<_>>());
    }

    /// Invariant 7: idempotence of no-op update. Re-submitting the current
    /// fields leaves the chain, the z-index, and the latest serial alone.
    #[test]
    fn noop_update_does_not_advance_the_log() {
        let store = fresh();
        let w = store.create(1, 2, 5, 3, 4);
        let before = store.status().latest_serial;
        let result = store.update(w.id, w.x, w.y, w.z, w.width, w.height).unwrap();
        assert_eq!(result, w);
        assert_eq!(store.status().latest_serial, before);
        assert_eq!(store.size(), 1);
    }

    /// Invariant 1 (narrow slice): a reader's snapshot serial never changes
    /// mid-read, so two calls inside one logical read observe the same
    /// committed state even if a write lands between them.
    #[test]
    fn update_is_invisible_to_a_get_taken_before_it_commits() {
        let store = fresh();
        let w = store.create(0, 0, 0, 1, 1);
        let before = store.get_by_id(w.id).unwrap();
        store.update(w.id, 42, 42, 0, 1, 1).unwrap();
        let after = store.get_by_id(w.id).unwrap();
        assert_ne!(before, after);
        assert_eq!(before.x, 0);
        assert_eq!(after.x, 42);
    }
}

mod end_to_end_scenarios {
    use super::*;

    /// S1. Create-and-read.
    #[test]
    fn s1_create_and_read() {
        let store = fresh();
        let w = store.create(1, 2, 5, 3, 4);
        let got = store.get_by_id(w.id).unwrap();
        assert_eq!((got.x, got.y, got.z, got.width, got.height), (1, 2, 5, 3, 4));
        assert_eq!(store.size(), 1);
    }

    /// S2. Z-shift on create.
    #[test]
    fn s2_z_shift_on_create() {
        let store = fresh();
        let a = store.create(0, 0, 1, 1, 1);
        let b = store.create(0, 0, 2, 1, 1);
        let c = store.create(0, 0, 3, 1, 1);
        let d = store.create(0, 0, 1, 1, 1);

        assert_eq!(store.get_by_id(d.id).unwrap().z, 1);
        assert_eq!(store.get_by_id(a.id).unwrap().z, 2);
        assert_eq!(store.get_by_id(b.id).unwrap().z, 3);
        assert_eq!(store.get_by_id(c.id).unwrap().z, 4);

        let ids: Vec<i32> = store.range_by_z(0, 10).map(|w| w.id).collect();
        assert_eq!(ids, vec![d.id, a.id, b.id, c.id]);
    }

    /// S3. Z-shift on update.
    #[test]
    fn s3_z_shift_on_update() {
        let store = fresh();
        let a = store.create(0, 0, 1, 1, 1);
        let b = store.create(0, 0, 2, 1, 1);
        let c = store.create(0, 0, 3, 1, 1);

        store.update(a.id, a.x, a.y, 2, a.width, a.height).unwrap();

        assert_eq!(store.get_by_id(a.id).unwrap().z, 2);
        assert_eq!(store.get_by_id(b.id).unwrap().z, 3);
        assert_eq!(store.get_by_id(c.id).unwrap().z, 4);
    }

    /// S4. Delete reduces size.
    #[test]
    fn s4_delete_reduces_size() {
        let store = fresh();
        let first = store.create(0, 0, 0, 1, 1);
        let second = store.create(0, 0, 1, 1, 1);

        store.delete(first.id).unwrap();

        assert_eq!(store.size(), 1);
        assert_eq!(store.get_by_id(first.id), None);
        assert_eq!(store.get_by_id(second.id), Some(second));
    }

    /// S6. Idempotent no-op update.
    #[test]
    fn s6_idempotent_noop_update() {
        let store = fresh();
        let w = store.create(1, 2, 3, 4, 5);
        let before_serial = store.status().latest_serial;

        let result = store
            .update(w.id, w.x, w.y, w.z, w.width, w.height)
            .unwrap();

        assert_eq!(result, w);
        assert_eq!(store.status().latest_serial, before_serial);
        assert_eq!(store.size(), 1);
    }
}

mod error_paths {
    use super::*;

    #[test]
    fn update_missing_id_is_not_found() {
        let store = fresh();
        let err = store.update(999, 0, 0, 0, 1, 1).unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[test]
    fn delete_missing_id_is_not_found() {
        let store = fresh();
        let err = store.delete(999).unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[test]
    fn update_to_top_missing_id_is_not_found() {
        let store = fresh();
        let err = store.update_to_top(999, 0, 0, 1, 1).unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[test]
    fn get_by_id_missing_is_none() {
        let store = fresh();
        assert_eq!(store.get_by_id(12345), None);
    }
}

mod clear_and_vacuum {
    use super::*;

    #[test]
    fn clear_resets_the_store_to_fresh_state() {
        let store = fresh();
        store.create(0, 0, 0, 1, 1);
        store.create(0, 0, 1, 1, 1);
        assert_eq!(store.size(), 2);

        store.clear();

        assert_eq!(store.size(), 0);
        assert_eq!(store.status().latest_serial, -1, "serial sequence resets too");
        let fresh_id = store.create(0, 0, 0, 1, 1);
        assert_eq!(fresh_id.id, 0, "id sequence resets too");
    }

    #[test]
    fn vacuum_reclaims_superseded_versions_with_no_live_readers() {
        let store = fresh();
        let w = store.create(0, 0, 0, 1, 1);
        store.update(w.id, 1, 1, 0, 1, 1).unwrap();
        store.update(w.id, 2, 2, 0, 1, 1).unwrap();

        store.vacuum();

        // The newest version must still resolve correctly post-vacuum.
        let current = store.get_by_id(w.id).unwrap();
        assert_eq!((current.x, current.y), (2, 2));
        assert_eq!(store.size(), 1);
    }
}
