// [crates/consultease-cache/src/lib.rs]
/*!
 * Keyed in-memory caches for faculty snapshots and list views (spec §4.2
 * "Cache Coordinator"). Invalidation is atomic across the faculty cache
 * and its derived list views (they share a single lock) and is never
 * called from inside a transaction; callers invalidate after their
 * commit has already returned (Invariant 4, §3).
 */

use consultease_domain::FacultySnapshot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

const QUERY_CACHE_TTL: Duration = Duration::from_secs(30);
const CONFIG_CACHE_TTL: Duration = Duration::from_secs(300);

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn fresh(value: T, ttl: Duration) -> Self {
        Self { value, expires_at: Instant::now() + ttl }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// The list-view cache key: a faculty list request is identified by its
/// filter parameters so distinct filters don't collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FacultyListKey {
    pub department: Option<String>,
    pub present_only: bool,
}

#[derive(Default)]
struct State {
    faculty: HashMap<i64, Entry<FacultySnapshot>>,
    faculty_lists: HashMap<FacultyListKey, Entry<Vec<FacultySnapshot>>>,
    config: Option<Entry<String>>,
}

/// Cache Coordinator: owns cache storage only, never holds its lock
/// across I/O (Ownership rule, §3). All operations are synchronous and
/// short-lived.
pub struct CacheCoordinator {
    state: Mutex<State>,
}

impl Default for CacheCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheCoordinator {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()) }
    }

    pub fn get_faculty(&self, id: i64) -> Option<FacultySnapshot> {
        let mut state = self.state.lock();
        match state.faculty.get(&id) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => {
                state.faculty.remove(&id);
                None
            }
            None => None,
        }
    }

    pub fn put_faculty(&self, snapshot: FacultySnapshot) {
        let mut state = self.state.lock();
        state.faculty.insert(snapshot.id, Entry::fresh(snapshot, QUERY_CACHE_TTL));
    }

    pub fn get_faculty_list(&self, key: &FacultyListKey) -> Option<Vec<FacultySnapshot>> {
        let mut state = self.state.lock();
        match state.faculty_lists.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => {
                state.faculty_lists.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put_faculty_list(&self, key: FacultyListKey, snapshots: Vec<FacultySnapshot>) {
        let mut state = self.state.lock();
        state.faculty_lists.insert(key, Entry::fresh(snapshots, QUERY_CACHE_TTL));
    }

    pub fn get_config_snapshot(&self) -> Option<String> {
        let state = self.state.lock();
        state.config.as_ref().filter(|e| !e.is_expired()).map(|e| e.value.clone())
    }

    pub fn put_config_snapshot(&self, rendered: String) {
        let mut state = self.state.lock();
        state.config = Some(Entry::fresh(rendered, CONFIG_CACHE_TTL));
    }

    /// Invalidates a single faculty entry and every list view, since a
    /// list view's contents may now be stale regardless of its filter
    /// (spec §4.2 "also invalidates any derived list views"). Must only
    /// be called after the mutating transaction has committed.
    pub fn invalidate_faculty(&self, id: i64) {
        let mut state = self.state.lock();
        state.faculty.remove(&id);
        let dropped = state.faculty_lists.len();
        state.faculty_lists.clear();
        debug!("invalidated faculty id={id} cache entry and {dropped} list view(s)");
    }

    /// Drops everything. Used when an administrator action (faculty
    /// creation/deletion) changes the shape of list views rather than a
    /// single row's contents.
    pub fn invalidate_all_faculty(&self) {
        let mut state = self.state.lock();
        state.faculty.clear();
        state.faculty_lists.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consultease_domain::{Faculty, NtpSyncStatus};

    fn snapshot(id: i64) -> FacultySnapshot {
        Faculty {
            id,
            name: "Dr. Reyes".into(),
            department: "CS".into(),
            email: None,
            beacon_mac: None,
            always_available: false,
            present: true,
            last_seen: None,
            ntp_sync_status: NtpSyncStatus::Synced,
            in_grace_period: false,
            version: 1,
        }
        .to_snapshot()
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = CacheCoordinator::new();
        cache.put_faculty(snapshot(1));
        assert_eq!(cache.get_faculty(1).unwrap().id, 1);
    }

    #[test]
    fn invalidate_faculty_clears_entry_and_lists() {
        let cache = CacheCoordinator::new();
        cache.put_faculty(snapshot(1));
        let key = FacultyListKey { department: None, present_only: false };
        cache.put_faculty_list(key.clone(), vec![snapshot(1)]);

        cache.invalidate_faculty(1);

        assert!(cache.get_faculty(1).is_none());
        assert!(cache.get_faculty_list(&key).is_none());
    }

    #[test]
    fn missing_key_returns_none() {
        let cache = CacheCoordinator::new();
        assert!(cache.get_faculty(42).is_none());
    }
}
