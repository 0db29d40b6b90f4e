use std::collections::BTreeMap;

/// Keyed record store the ledger tables are built on.
///
/// Keys are ordered so iteration (and therefore anything derived from it,
/// like holder listings) is deterministic.
#[derive(Debug, Clone)]
pub struct Table<K, R> {
    rows: BTreeMap<K, R>,
}

impl<K: Ord + Clone, R> Table<K, R> {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }

    /// Inserts `record` unless `key` is taken. Returns false on collision.
    pub fn insert_if_absent(&mut self, key: K, record: R) -> bool {
        if self.rows.contains_key(&key) {
            return false;
        }
        self.rows.insert(key, record);
        true
    }

    /// Runs `f` against the stored record. Returns `None` when `key` is absent.
    pub fn update<T>(&mut self, key: &K, f: impl FnOnce(&mut R) -> T) -> Option<T> {
        self.rows.get_mut(key).map(f)
    }

    /// Stores `record` under `key`, replacing whatever was there.
    pub fn put(&mut self, key: K, record: R) -> Option<R> {
        self.rows.insert(key, record)
    }

    pub fn delete(&mut self, key: &K) -> Option<R> {
        self.rows.remove(key)
    }

    pub fn lookup(&self, key: &K) -> Option<&R> {
        self.rows.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &R)> {
        self.rows.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }
}

impl<K: Ord + Clone, R> Default for Table<K, R> {
    fn default() -> Self {
        Self::new()
    }
}
