//! A table of independent read/write locks indexed by key.
//!
//! Each key owns one async [`RwLock`] guarding the value stored for that key.
//! Multi-key acquisition always takes locks in ascending key order and the
//! returned guards release them in descending order, so two operations over
//! overlapping key sets can never wait on each other in a cycle.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::error::LockTableError;

type Slot<V> = Arc<RwLock<V>>;

/// Registry mapping keys to independent read/write locks.
///
/// Entry creation is serialized by a table-wide mutex that is only held for
/// the lookup or insert itself, never while waiting on a key's lock.
pub struct KeyedLockTable<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for KeyedLockTable<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> fmt::Debug for KeyedLockTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLockTable")
            .field("entries", &self.table().len())
            .finish()
    }
}

impl<K, V> KeyedLockTable<K, V> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    // The map is only ever touched by non-panicking HashMap operations, so a
    // poisoned mutex still guards a consistent map.
    fn table(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of ensured keys.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns true if no key has been ensured.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Drops every entry.
    ///
    /// Guards that are still held keep their own lock alive, but the keys are
    /// gone from the table; only call this while the table is quiescent.
    pub fn clear(&self) {
        self.table().clear();
    }
}

impl<K, V> KeyedLockTable<K, V>
where
    K: Ord + Hash + Clone + fmt::Debug,
{
    /// Creates an entry for `key` with `init()` unless one already exists.
    ///
    /// Returns true if a new entry was created.
    pub fn ensure_with(&self, key: K, init: impl FnOnce() -> V) -> bool {
        let mut table = self.table();
        if table.contains_key(&key) {
            return false;
        }
        table.insert(key, Arc::new(RwLock::new(init())));
        true
    }

    /// Creates a default-valued entry for `key` unless one already exists.
    pub fn ensure(&self, key: K) -> bool
    where
        V: Default,
    {
        self.ensure_with(key, V::default)
    }

    /// Creates default-valued entries for every key not yet present, under a
    /// single acquisition of the table mutex.
    pub fn ensure_all(&self, keys: impl IntoIterator<Item = K>)
    where
        V: Default,
    {
        let mut table = self.table();
        for key in keys {
            table
                .entry(key)
                .or_insert_with(|| Arc::new(RwLock::new(V::default())));
        }
    }

    /// Returns true if `key` has been ensured.
    pub fn contains(&self, key: &K) -> bool {
        self.table().contains_key(key)
    }

    /// Removes the entry for `key`, returning true if it existed.
    pub fn remove(&self, key: &K) -> bool {
        self.table().remove(key).is_some()
    }

    /// Removes the entry for `key` if `pred` holds for its value and no guard
    /// or pending acquisition refers to it.
    ///
    /// Returns true if the entry was removed.
    pub fn remove_if(&self, key: &K, pred: impl FnOnce(&V) -> bool) -> bool {
        let mut table = self.table();
        let Some(slot) = table.get(key) else {
            return false;
        };
        // Only the table holds the slot, so nobody can start waiting on it
        // while the table mutex is held.
        if Arc::strong_count(slot) != 1 {
            return false;
        }
        let remove = match slot.try_read() {
            Ok(value) => pred(&value),
            Err(_) => false,
        };
        if remove {
            table.remove(key);
        }
        remove
    }

    fn slot(&self, key: &K) -> Result<Slot<V>, LockTableError> {
        self.table()
            .get(key)
            .cloned()
            .ok_or_else(|| not_ensured(key))
    }

    /// Sorts and dedups `keys`, resolving every slot before any lock is taken.
    fn slots_ascending(&self, keys: &[K]) -> Result<Vec<(K, Slot<V>)>, LockTableError> {
        let mut sorted = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let table = self.table();
        sorted
            .into_iter()
            .map(|key| match table.get(&key) {
                Some(slot) => Ok((key, slot.clone())),
                None => Err(not_ensured(&key)),
            })
            .collect()
    }

    /// Acquires the read lock of one key.
    pub async fn read(&self, key: &K) -> Result<OwnedRwLockReadGuard<V>, LockTableError> {
        let slot = self.slot(key)?;
        Ok(slot.read_owned().await)
    }

    /// Acquires the write lock of one key.
    pub async fn write(&self, key: &K) -> Result<OwnedRwLockWriteGuard<V>, LockTableError> {
        let slot = self.slot(key)?;
        Ok(slot.write_owned().await)
    }

    /// Acquires the read locks of every key in ascending key order.
    ///
    /// Duplicate keys are locked once.
    pub async fn read_many(&self, keys: &[K]) -> Result<MultiReadGuard<K, V>, LockTableError> {
        let slots = self.slots_ascending(keys)?;
        let mut held = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            held.push((key, slot.read_owned().await));
        }
        Ok(MultiReadGuard { held })
    }

    /// Creates default-valued entries for missing keys, then acquires the
    /// write locks of every key in ascending key order.
    ///
    /// Creation and slot lookup share one acquisition of the table mutex, so
    /// the entries cannot be removed in between.
    pub async fn ensure_write_many(&self, keys: &[K]) -> MultiWriteGuard<K, V>
    where
        V: Default,
    {
        let mut sorted = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let slots: Vec<(K, Slot<V>)> = {
            let mut table = self.table();
            sorted
                .into_iter()
                .map(|key| {
                    let slot = table
                        .entry(key.clone())
                        .or_insert_with(|| Arc::new(RwLock::new(V::default())))
                        .clone();
                    (key, slot)
                })
                .collect()
        };

        let mut held = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            held.push((key, slot.write_owned().await));
        }
        MultiWriteGuard { held }
    }

    /// Acquires the write locks of every key in ascending key order.
    ///
    /// Duplicate keys are locked once.
    pub async fn write_many(&self, keys: &[K]) -> Result<MultiWriteGuard<K, V>, LockTableError> {
        let slots = self.slots_ascending(keys)?;
        let mut held = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            held.push((key, slot.write_owned().await));
        }
        Ok(MultiWriteGuard { held })
    }
}

fn not_ensured<K: fmt::Debug>(key: &K) -> LockTableError {
    LockTableError::KeyNotEnsured {
        key: format!("{key:?}"),
    }
}

/// Read locks over a set of keys, held in ascending key order.
///
/// Dropping the guard releases the locks in descending key order.
pub struct MultiReadGuard<K, V> {
    held: Vec<(K, OwnedRwLockReadGuard<V>)>,
}

impl<K: Ord, V> MultiReadGuard<K, V> {
    /// Returns the value guarded for `key`, if `key` is held.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.held
            .binary_search_by(|(held, _)| held.cmp(key))
            .ok()
            .map(|index| &*self.held[index].1)
    }

    /// Returns the held keys in acquisition order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.held.iter().map(|(key, _)| key)
    }

    /// Releases every lock, highest key first.
    pub fn release(self) {}
}

impl<K, V> Drop for MultiReadGuard<K, V> {
    fn drop(&mut self) {
        while let Some((_, guard)) = self.held.pop() {
            drop(guard);
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for MultiReadGuard<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.held.iter().map(|(key, _)| key))
            .finish()
    }
}

/// Write locks over a set of keys, held in ascending key order.
///
/// Dropping the guard releases the locks in descending key order.
pub struct MultiWriteGuard<K, V> {
    held: Vec<(K, OwnedRwLockWriteGuard<V>)>,
}

impl<K: Ord, V> MultiWriteGuard<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.held.binary_search_by(|(held, _)| held.cmp(key)).ok()
    }

    /// Returns the value guarded for `key`, if `key` is held.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.position(key).map(|index| &*self.held[index].1)
    }

    /// Returns the value guarded for `key` mutably, if `key` is held.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.position(key).map(|index| &mut *self.held[index].1)
    }

    /// Returns the held keys in acquisition order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.held.iter().map(|(key, _)| key)
    }

    /// Releases every lock, highest key first.
    pub fn release(self) {}
}

impl<K, V> Drop for MultiWriteGuard<K, V> {
    fn drop(&mut self) {
        while let Some((_, guard)) = self.held.pop() {
            drop(guard);
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for MultiWriteGuard<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.held.iter().map(|(key, _)| key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let table: KeyedLockTable<i64, u32> = KeyedLockTable::new();
        assert!(table.ensure(1));
        assert!(!table.ensure(1));
        table.ensure_all([1, 2, 3, 2]);
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn ensure_keeps_existing_value() {
        let table: KeyedLockTable<i64, u32> = KeyedLockTable::new();
        table.ensure_with(7, || 11);
        *table.write(&7).await.unwrap() += 1;
        table.ensure_with(7, || 0);
        assert_eq!(*table.read(&7).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn acquiring_unknown_key_fails() {
        let table: KeyedLockTable<i64, ()> = KeyedLockTable::new();
        let err = table.write(&4).await.unwrap_err();
        assert_eq!(
            err,
            LockTableError::KeyNotEnsured {
                key: "4".to_string()
            }
        );
    }

    #[tokio::test]
    async fn multi_acquire_with_unknown_key_takes_nothing() {
        let table: KeyedLockTable<i64, ()> = KeyedLockTable::new();
        table.ensure_all([1, 2]);

        assert!(table.write_many(&[2, 9, 1]).await.is_err());

        // Nothing may be left held by the failed attempt.
        let guard = timeout(SHORT, table.write_many(&[1, 2])).await;
        assert!(guard.is_ok());
    }

    #[tokio::test]
    async fn multi_guard_holds_keys_ascending_and_deduplicated() {
        let table: KeyedLockTable<i64, ()> = KeyedLockTable::new();
        table.ensure_all([5, -3, 0]);

        let guard = table.write_many(&[5, 0, -3, 5]).await.unwrap();
        assert_eq!(guard.keys().copied().collect::<Vec<_>>(), vec![-3, 0, 5]);

        let guard = {
            guard.release();
            table.read_many(&[0, 5, 0]).await.unwrap()
        };
        assert_eq!(guard.keys().copied().collect::<Vec<_>>(), vec![0, 5]);
    }

    #[tokio::test]
    async fn writers_exclude_and_readers_share() {
        let table: KeyedLockTable<i64, ()> = KeyedLockTable::new();
        table.ensure(1);

        let first = table.read(&1).await.unwrap();
        assert!(timeout(SHORT, table.read(&1)).await.is_ok());
        assert!(timeout(SHORT, table.write(&1)).await.is_err());
        drop(first);

        let writer = table.write(&1).await.unwrap();
        assert!(timeout(SHORT, table.read(&1)).await.is_err());
        drop(writer);
        assert!(timeout(SHORT, table.read(&1)).await.is_ok());
    }

    #[tokio::test]
    async fn disjoint_keys_do_not_contend() {
        let table: KeyedLockTable<i64, ()> = KeyedLockTable::new();
        table.ensure_all([1, 2, 3, 4]);

        let _left = table.write_many(&[1, 2]).await.unwrap();
        assert!(timeout(SHORT, table.write_many(&[3, 4])).await.is_ok());
        assert!(timeout(SHORT, table.write_many(&[2, 3])).await.is_err());
    }

    #[tokio::test]
    async fn multi_write_guard_mutates_values() {
        let table: KeyedLockTable<i64, i64> = KeyedLockTable::new();
        table.ensure_all([1, 2]);

        let mut guard = table.write_many(&[2, 1]).await.unwrap();
        *guard.get_mut(&1).unwrap() = 10;
        *guard.get_mut(&2).unwrap() = 20;
        assert!(guard.get_mut(&3).is_none());
        drop(guard);

        let guard = table.read_many(&[1, 2]).await.unwrap();
        assert_eq!(guard.get(&1), Some(&10));
        assert_eq!(guard.get(&2), Some(&20));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_key_sets_in_opposite_orders_do_not_deadlock() {
        let table: Arc<KeyedLockTable<i64, u64>> = Arc::new(KeyedLockTable::new());
        table.ensure_all(0..6);

        let mut tasks = Vec::new();
        for worker in 0..16i64 {
            let table = table.clone();
            tasks.push(tokio::spawn(async move {
                for round in 0..200i64 {
                    let mut keys: Vec<i64> = (0..6).filter(|k| (k + worker + round) % 3 != 0).collect();
                    if worker % 2 == 0 {
                        keys.reverse();
                    }
                    let mut guard = table.write_many(&keys).await.unwrap();
                    for key in &keys {
                        *guard.get_mut(key).unwrap() += 1;
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        let all = futures_util::future::join_all(tasks);
        let results = timeout(Duration::from_secs(30), all)
            .await
            .expect("multi-key locking deadlocked");
        for result in results {
            result.unwrap();
        }
    }

    #[tokio::test]
    async fn clear_forgets_keys() {
        let table: KeyedLockTable<i64, ()> = KeyedLockTable::new();
        table.ensure_all([1, 2]);
        assert!(table.remove(&1));
        assert!(!table.contains(&1));
        table.clear();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn ensure_write_many_creates_missing_entries() {
        let table: KeyedLockTable<i64, u32> = KeyedLockTable::new();
        table.ensure_with(2, || 7);

        let mut guard = table.ensure_write_many(&[3, 2, 3]).await;
        assert_eq!(guard.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(guard.get(&2), Some(&7));
        *guard.get_mut(&3).unwrap() = 1;
        guard.release();

        assert_eq!(table.len(), 2);
        assert_eq!(*table.read(&3).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_if_skips_entries_in_use() {
        let table: KeyedLockTable<i64, u32> = KeyedLockTable::new();
        table.ensure_all([1, 2]);

        let held = table.read(&1).await.unwrap();
        assert!(!table.remove_if(&1, |_| true));
        drop(held);

        assert!(!table.remove_if(&2, |value| *value > 0));
        assert!(table.remove_if(&1, |_| true));
        assert!(!table.remove_if(&9, |_| true));
        assert!(!table.contains(&1));
        assert!(table.contains(&2));
    }
}
