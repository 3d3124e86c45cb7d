//! DysectHashMap: a fixed-width directory of independently growing Robin
//! Hood subtables.
//!
//! The directory routes every operation on the low bits of the key's hash;
//! the selected subtable reduces the remaining bits against its own
//! capacity. Only the subtable that overflows grows, so a skewed workload
//! pays for the hot shard alone instead of doubling one monolithic array.

use crate::sub_table::{self, LookupError, SubTable};
use crate::DIRECTORY_SIZE;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use std::collections::hash_map::RandomState;

/// Two-level hash map with a fixed directory of eight subtables.
///
/// Insertion keeps the first value seen for a key; `insert` reports
/// whether the pair was newly stored. Iteration order is slot order within
/// a subtable and directory order across subtables; it is neither
/// insertion order nor key order and may change when a subtable grows.
#[derive(Clone)]
pub struct DysectHashMap<K, V, S = RandomState> {
    hasher: S,
    tables: [SubTable<K, V, S>; DIRECTORY_SIZE],
    len: usize,
}

impl<K, V, S> DysectHashMap<K, V, S> {
    fn table_index(hash: u64) -> usize {
        (hash & (DIRECTORY_SIZE as u64 - 1)) as usize
    }

    /// Number of entries across all subtables.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a reference to the map's hasher.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Clears every subtable back to its initial capacity.
    pub fn clear(&mut self) {
        for table in &mut self.tables {
            table.clear();
        }
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            tables: self.tables.iter(),
            inner: None,
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, S> {
        IterMut {
            tables: self.tables.iter_mut(),
            inner: None,
            remaining: self.len,
        }
    }
}

impl<K, V> DysectHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S> DysectHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Creates an empty map; the hasher is cloned into each subtable so a
    /// subtable can rehash its own entries when it grows.
    pub fn with_hasher(hasher: S) -> Self {
        let tables = core::array::from_fn(|_| SubTable::with_hasher(hasher.clone()));
        Self {
            hasher,
            tables,
            len: 0,
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Inserts `key`/`value` if the key is absent anywhere in the map.
    /// Returns true iff the pair was newly inserted; an existing key keeps
    /// its current value.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.make_hash(&key);
        let inserted = self.tables[Self::table_index(hash)].insert_hashed(hash, key, value);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    /// Removes the entry for `key` and returns the owned pair if it was
    /// present. The hit subtable compacts itself; the others are untouched.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(key);
        let removed = self.tables[Self::table_index(hash)].remove_hashed(hash, key);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(key);
        self.tables[Self::table_index(hash)].get_mut_hashed(hash, key)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(key);
        self.tables[Self::table_index(hash)].get_key_value_hashed(hash, key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(key).is_some()
    }

    /// Checked lookup: forwards the subtable's [`LookupError::MissingKey`]
    /// unchanged when the key is absent.
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).ok_or(LookupError::MissingKey)
    }

    /// Returns a mutable reference to the value for `key`, inserting
    /// `default()` first if the key is absent.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        let (inserted, value) =
            self.tables[Self::table_index(hash)].get_or_insert_with_hashed(hash, key, default);
        if inserted {
            self.len += 1;
        }
        value
    }

    /// [`get_or_insert_with`](Self::get_or_insert_with) with the value
    /// type's default.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }
}

impl<K, V, S> Default for DysectHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> fmt::Debug for DysectHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for DysectHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |w| *v == *w))
    }
}

impl<K, V, S> Eq for DysectHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher + Clone,
{
}

impl<K, V, S> Extend<(K, V)> for DysectHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Extends the map with a sequence of pairs. Unlike the std maps, the
    /// container's first-occurrence-wins policy applies: a key already
    /// present keeps its current value.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for DysectHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for DysectHashMap<K, V>
where
    K: Eq + Hash,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Self::from_iter(pairs)
    }
}

/// Iterator over the map's entries: subtables in directory order, slots in
/// slot order within each.
pub struct Iter<'a, K, V, S> {
    tables: core::slice::Iter<'a, SubTable<K, V, S>>,
    inner: Option<sub_table::Iter<'a, K, V>>,
    remaining: usize,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = &mut self.inner {
                if let Some(entry) = inner.next() {
                    self.remaining -= 1;
                    return Some(entry);
                }
            }
            self.inner = Some(self.tables.next()?.iter());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, S> ExactSizeIterator for Iter<'_, K, V, S> {}
impl<K, V, S> FusedIterator for Iter<'_, K, V, S> {}

/// Iterator over the map's entries with mutable access to the values.
pub struct IterMut<'a, K, V, S> {
    tables: core::slice::IterMut<'a, SubTable<K, V, S>>,
    inner: Option<sub_table::IterMut<'a, K, V>>,
    remaining: usize,
}

impl<'a, K, V, S> Iterator for IterMut<'a, K, V, S> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = &mut self.inner {
                if let Some(entry) = inner.next() {
                    self.remaining -= 1;
                    return Some(entry);
                }
            }
            self.inner = Some(self.tables.next()?.iter_mut());
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, S> ExactSizeIterator for IterMut<'_, K, V, S> {}
impl<K, V, S> FusedIterator for IterMut<'_, K, V, S> {}

impl<'a, K, V, S> IntoIterator for &'a DysectHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Iter<'a, K, V, S> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut DysectHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V, S>;

    fn into_iter(self) -> IterMut<'a, K, V, S> {
        self.iter_mut()
    }
}

#[cfg(test)]
impl<K, V, S> DysectHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Asserts the directory-level invariants plus every subtable's own.
    /// Test-only; walks the whole structure.
    pub(crate) fn check_invariants(&self) {
        let mut total = 0;
        for (table_idx, table) in self.tables.iter().enumerate() {
            table.check_invariants();
            total += table.len();
            for (key, _) in table.iter() {
                assert_eq!(
                    Self::table_index(self.make_hash(key)),
                    table_idx,
                    "entry routed to the wrong subtable"
                );
            }
        }
        assert_eq!(total, self.len, "aggregate len out of sync with subtables");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;

    // Passes u64 keys through unchanged; key k routes to subtable k & 7.
    #[derive(Clone, Default)]
    struct PassThrough;

    struct PassThroughHasher(u64);

    impl Hasher for PassThroughHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | u64::from(b);
            }
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
    }

    impl BuildHasher for PassThrough {
        type Hasher = PassThroughHasher;

        fn build_hasher(&self) -> PassThroughHasher {
            PassThroughHasher(0)
        }
    }

    type Map = DysectHashMap<u64, u64, PassThrough>;

    #[test]
    fn routing_uses_the_low_hash_bits() {
        let mut m: Map = DysectHashMap::with_hasher(PassThrough);
        for k in 0..8 {
            assert!(m.insert(k, k * 10));
        }
        for (idx, table) in m.tables.iter().enumerate() {
            assert_eq!(table.len(), 1, "subtable {idx} should hold exactly one key");
        }
        m.check_invariants();
    }

    #[test]
    fn only_the_hot_subtable_grows() {
        let mut m: Map = DysectHashMap::with_hasher(PassThrough);
        // Multiples of 8 all route to subtable 0.
        for k in (0..).map(|i| i * 8).take(16) {
            assert!(m.insert(k, 0));
        }
        assert!(m.tables[0].capacity() > 8);
        for table in &m.tables[1..] {
            assert_eq!(table.capacity(), 8);
        }
        m.check_invariants();
    }

    #[test]
    fn composite_iteration_walks_the_directory_in_order() {
        let mut m: Map = DysectHashMap::with_hasher(PassThrough);
        for k in (0..8).rev() {
            assert!(m.insert(k, k));
        }
        // One key per subtable, each at its home slot: iteration yields
        // directory order regardless of insertion order.
        let keys: Vec<u64> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..8).collect::<Vec<u64>>());
    }

    #[test]
    fn aggregate_len_follows_insert_and_remove() {
        let mut m: Map = DysectHashMap::with_hasher(PassThrough);
        for k in 0..100 {
            assert!(m.insert(k, k));
        }
        assert_eq!(m.len(), 100);
        for k in (0..100).step_by(2) {
            assert!(m.remove(&k).is_some());
        }
        assert_eq!(m.len(), 50);
        assert_eq!(m.iter().count(), 50);
        m.check_invariants();
    }
}
