// [crates/consultease-presence/src/lock_map.rs]
/*!
 * Process-wide map of per-faculty locks, guarded by a creation mutex
 * using the double-checked pattern so two concurrent first-time
 * accesses for the same faculty id never produce two distinct lock
 * objects (spec §4.5 step 1, §9 "Manual lock map with double-check").
 * The pattern is carried over verbatim rather than replaced with a
 * concurrent map, per the spec's explicit design note.
 */

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Default)]
pub struct FacultyLockMap {
    locks: RwLock<HashMap<i64, Arc<AsyncMutex<()>>>>,
    creation_guard: Mutex<()>,
}

impl FacultyLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `faculty_id`, creating it if this is the
    /// first access. Two threads racing to create the same id's lock
    /// both observe a consistent single object.
    pub fn get_or_create(&self, faculty_id: i64) -> Arc<AsyncMutex<()>> {
        if let Some(existing) = self.locks.read().get(&faculty_id) {
            return existing.clone();
        }

        let _creation_permit = self.creation_guard.lock();
        // Re-check: another thread may have created it while we were
        // waiting for the creation guard.
        if let Some(existing) = self.locks.read().get(&faculty_id) {
            return existing.clone();
        }

        let fresh = Arc::new(AsyncMutex::new(()));
        self.locks.write().insert(faculty_id, fresh.clone());
        fresh
    }

    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_first_access_yields_one_lock() {
        let map = Arc::new(FacultyLockMap::new());
        let mut handles = Vec::new();
        let seen_ptrs = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..32 {
            let map = map.clone();
            let seen_ptrs = seen_ptrs.clone();
            handles.push(tokio::spawn(async move {
                let lock = map.get_or_create(7);
                seen_ptrs.lock().push(Arc::as_ptr(&lock) as usize);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(map.len(), 1);
        let ptrs = seen_ptrs.lock();
        assert!(ptrs.iter().all(|p| *p == ptrs[0]), "every task must observe the same lock object");
    }

    #[tokio::test]
    async fn distinct_ids_get_distinct_locks() {
        let map = FacultyLockMap::new();
        let a = map.get_or_create(1);
        let b = map.get_or_create(2);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(map.len(), 2);
    }
}
