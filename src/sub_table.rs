//! SubTable: a Robin Hood open-addressed flat table, usable standalone or
//! as one entry of the top-level directory.

use crate::slot::Slot;
use crate::DIRECTORY_BITS;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem;
use std::collections::hash_map::RandomState;

/// Capacity a subtable starts with and returns to on `clear`.
pub(crate) const INITIAL_CAPACITY: usize = 8;

/// Failed lookup through the checked accessor [`SubTable::try_get`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LookupError {
    MissingKey,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::MissingKey => f.write_str("key not found"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Robin Hood hash table over a contiguous, power-of-two slot array.
///
/// Entries are kept in probe-distance order: on collision the entry that
/// is further from its home slot keeps the slot, equalising probe
/// distances. Deletion back-shifts the displaced run so that no tombstones
/// are ever needed. Capacity doubles whenever the load factor would reach
/// one half.
pub struct SubTable<K, V, S = RandomState> {
    hasher: S,
    slots: Vec<Slot<K, V>>,
    len: usize,
}

impl<K, V, S> SubTable<K, V, S> {
    fn empty_slots(capacity: usize) -> Vec<Slot<K, V>> {
        std::iter::repeat_with(|| Slot::Empty).take(capacity).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot-array length. Always a power of two, at least 8.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns a reference to the table's hasher.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Removes every entry and returns the slot array to its initial
    /// capacity.
    pub fn clear(&mut self) {
        self.slots = Self::empty_slots(INITIAL_CAPACITY);
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            slots: self.slots.iter_mut(),
            remaining: self.len,
        }
    }
}

impl<K, V> SubTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S> Default for SubTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> SubTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            slots: Self::empty_slots(INITIAL_CAPACITY),
            len: 0,
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    // The directory routes on the low bits of the hash; the subtable keys
    // its probe sequence off the remaining bits so that co-routed keys do
    // not all share one home slot.
    fn home(&self, hash: u64) -> usize {
        ((hash >> DIRECTORY_BITS) & (self.slots.len() as u64 - 1)) as usize
    }

    fn next_pos(&self, pos: usize) -> usize {
        (pos + 1) & (self.slots.len() - 1)
    }

    /// Walks forward from the hash's home slot and returns the position
    /// and PSL at which a new entry with this hash settles: the first slot
    /// that is empty or holds a resident closer to its own home.
    fn probe_vacant(&self, hash: u64) -> (usize, usize) {
        let mut idx = self.home(hash);
        let mut psl = 0;
        while let Slot::Occupied { psl: resident, .. } = &self.slots[idx] {
            if *resident < psl {
                break;
            }
            idx = self.next_pos(idx);
            psl += 1;
        }
        (idx, psl)
    }

    /// Installs an entry at `idx`, displacing poorer residents forward
    /// until the run ends in an empty slot.
    fn place(&mut self, mut idx: usize, mut key: K, mut value: V, mut psl: usize) {
        loop {
            match &mut self.slots[idx] {
                slot @ Slot::Empty => {
                    *slot = Slot::Occupied { key, value, psl };
                    return;
                }
                Slot::Occupied {
                    key: resident_key,
                    value: resident_value,
                    psl: resident_psl,
                } => {
                    // Ties keep the resident; only a strictly poorer
                    // newcomer takes the slot.
                    if *resident_psl < psl {
                        mem::swap(resident_key, &mut key);
                        mem::swap(resident_value, &mut value);
                        mem::swap(resident_psl, &mut psl);
                    }
                }
            }
            idx = self.next_pos(idx);
            psl += 1;
        }
    }

    // Doubles the slot array and re-places every live entry against the
    // new capacity. The new array is allocated before any entry moves, so
    // a failed allocation leaves the table untouched.
    fn grow(&mut self) {
        let doubled = Self::empty_slots(self.slots.len() * 2);
        let old = mem::replace(&mut self.slots, doubled);
        for slot in old {
            if let Slot::Occupied { key, value, .. } = slot {
                let hash = self.make_hash(&key);
                let (idx, psl) = self.probe_vacant(hash);
                self.place(idx, key, value, psl);
            }
        }
    }

    // Capacity is reserved ahead of the insertion that would reach the
    // one-half load ceiling, so the landing slot computed afterwards stays
    // valid for the caller.
    fn reserve_one(&mut self) {
        if 2 * (self.len + 1) >= self.slots.len() {
            self.grow();
        }
    }

    fn find_hashed<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut idx = self.home(hash);
        let mut psl = 0;
        loop {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Occupied {
                    key: resident,
                    psl: resident_psl,
                    ..
                } => {
                    // A resident closer to home than our walk distance
                    // proves the key cannot live further along.
                    if *resident_psl < psl {
                        return None;
                    }
                    if resident.borrow() == key {
                        return Some(idx);
                    }
                }
            }
            idx = self.next_pos(idx);
            psl += 1;
        }
    }

    pub(crate) fn insert_hashed(&mut self, hash: u64, key: K, value: V) -> bool {
        let mut idx = self.home(hash);
        let mut psl = 0;
        loop {
            match &self.slots[idx] {
                Slot::Empty => break,
                Slot::Occupied {
                    key: resident,
                    psl: resident_psl,
                    ..
                } => {
                    if *resident_psl < psl {
                        break;
                    }
                    if *resident == key {
                        return false;
                    }
                }
            }
            idx = self.next_pos(idx);
            psl += 1;
        }
        self.reserve_one();
        let (idx, psl) = self.probe_vacant(hash);
        self.place(idx, key, value, psl);
        self.len += 1;
        true
    }

    pub(crate) fn remove_hashed<Q>(&mut self, hash: u64, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let idx = self.find_hashed(hash, key)?;
        let removed = mem::replace(&mut self.slots[idx], Slot::Empty);
        self.len -= 1;
        self.shift_back(idx);
        removed.into_pair()
    }

    // Back-shift compaction: pull the displaced run one slot toward home
    // until it ends in an empty slot or an entry already at its home.
    fn shift_back(&mut self, mut hole: usize) {
        loop {
            let next = self.next_pos(hole);
            match &mut self.slots[next] {
                Slot::Empty => return,
                Slot::Occupied { psl, .. } => {
                    if *psl == 0 {
                        return;
                    }
                    *psl -= 1;
                }
            }
            self.slots.swap(hole, next);
            hole = next;
        }
    }

    pub(crate) fn get_key_value_hashed<Q>(&self, hash: u64, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let idx = self.find_hashed(hash, key)?;
        match &self.slots[idx] {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            Slot::Empty => None,
        }
    }

    pub(crate) fn get_mut_hashed<Q>(&mut self, hash: u64, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let idx = self.find_hashed(hash, key)?;
        match &mut self.slots[idx] {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Empty => None,
        }
    }

    pub(crate) fn get_or_insert_with_hashed<F>(
        &mut self,
        hash: u64,
        key: K,
        default: F,
    ) -> (bool, &mut V)
    where
        F: FnOnce() -> V,
    {
        match self.find_hashed(hash, &key) {
            Some(idx) => match &mut self.slots[idx] {
                Slot::Occupied { value, .. } => (false, value),
                Slot::Empty => unreachable!("lookup returned an empty slot"),
            },
            None => {
                self.reserve_one();
                let (idx, psl) = self.probe_vacant(hash);
                self.place(idx, key, default(), psl);
                self.len += 1;
                match &mut self.slots[idx] {
                    Slot::Occupied { value, .. } => (true, value),
                    Slot::Empty => unreachable!("freshly placed slot is empty"),
                }
            }
        }
    }

    /// Inserts `key`/`value` if the key is absent. Returns true iff the
    /// pair was newly inserted; an existing key keeps its current value.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.make_hash(&key);
        self.insert_hashed(hash, key, value)
    }

    /// Removes the entry for `key`, compacting the displaced run behind
    /// it, and returns the owned pair if the key was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(key);
        self.remove_hashed(hash, key)
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
        self.get_mut_hashed(hash, key)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value_hashed(self.make_hash(key), key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(key).is_some()
    }

    /// Checked lookup: a reference to the value for `key`, or
    /// [`LookupError::MissingKey`] when absent.
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
        self.get_or_insert_with_hashed(hash, key, default).1
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

impl<K, V, S> Extend<(K, V)> for SubTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Extends the table with a sequence of pairs under the table's
    /// first-occurrence-wins policy: a key already present keeps its
    /// current value.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for SubTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = Self::with_hasher(S::default());
        table.extend(iter);
        table
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for SubTable<K, V>
where
    K: Eq + Hash,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Self::from_iter(pairs)
    }
}

impl<K, V, S> Clone for SubTable<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            slots: self.slots.clone(),
            len: self.len,
        }
    }
}

impl<K, V, S> fmt::Debug for SubTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over a subtable's entries in slot order.
pub struct Iter<'a, K, V> {
    slots: core::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Slot::Occupied { key, value, .. } = self.slots.next()? {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over a subtable's entries with mutable access to the values.
/// Keys are never handed out mutably; mutating a key in place would break
/// the hash invariants.
pub struct IterMut<'a, K, V> {
    slots: core::slice::IterMut<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Slot::Occupied { key, value, .. } = self.slots.next()? {
                self.remaining -= 1;
                return Some((&*key, value));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

impl<'a, K, V, S> IntoIterator for &'a SubTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut SubTable<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

#[cfg(test)]
impl<K, V, S> SubTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Asserts every structural invariant of the table. Test-only; walks
    /// the whole slot array.
    pub(crate) fn check_invariants(&self) {
        let cap = self.slots.len();
        assert!(
            cap.is_power_of_two() && cap >= INITIAL_CAPACITY,
            "capacity {cap} must be a power of two of at least {INITIAL_CAPACITY}"
        );
        let occupied = self
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied { .. }))
            .count();
        assert_eq!(occupied, self.len, "len does not match occupied slots");
        assert!(
            2 * self.len <= cap,
            "load factor ceiling exceeded: {} entries in {cap} slots",
            self.len
        );

        let mut seen: std::collections::HashSet<&K> =
            std::collections::HashSet::with_capacity(self.len);
        for (idx, slot) in self.slots.iter().enumerate() {
            let Slot::Occupied { key, psl, .. } = slot else {
                continue;
            };
            let home = self.home(self.make_hash(key));
            assert_eq!(
                *psl,
                (idx + cap - home) & (cap - 1),
                "slot {idx}: stored PSL does not match distance from home {home}"
            );
            if *psl > 0 {
                let prev = (idx + cap - 1) & (cap - 1);
                match &self.slots[prev] {
                    Slot::Empty => {
                        panic!("slot {idx} has PSL {psl} but an empty predecessor")
                    }
                    Slot::Occupied { psl: prev_psl, .. } => assert!(
                        *prev_psl + 1 >= *psl,
                        "slot {idx}: PSL {psl} after predecessor with PSL {prev_psl}"
                    ),
                }
            }
            assert!(seen.insert(key), "duplicate key in table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;

    // Passes u64 keys through unchanged so slot layouts are deterministic:
    // with capacity 8 the directory bits are 0..=7 and the home index is
    // the next three bits.
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

    type Table = SubTable<u64, &'static str, PassThrough>;

    fn slot_of(t: &Table, idx: usize) -> (u64, usize) {
        match &t.slots[idx] {
            Slot::Occupied { key, psl, .. } => (*key, *psl),
            Slot::Empty => panic!("slot {idx} unexpectedly empty"),
        }
    }

    #[test]
    fn fresh_table_is_empty_at_initial_capacity() {
        let t: Table = SubTable::with_hasher(PassThrough);
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        assert_eq!(t.capacity(), INITIAL_CAPACITY);
        assert_eq!(t.iter().count(), 0);
    }

    #[test]
    fn collision_chain_stores_increasing_psls() {
        // Keys 0, 1 and 2 share home slot 0 under the pass-through hasher.
        let mut t: Table = SubTable::with_hasher(PassThrough);
        assert!(t.insert(0, "a"));
        assert!(t.insert(1, "b"));
        assert!(t.insert(2, "c"));
        assert_eq!(slot_of(&t, 0), (0, 0));
        assert_eq!(slot_of(&t, 1), (1, 1));
        assert_eq!(slot_of(&t, 2), (2, 2));
        t.check_invariants();
    }

    #[test]
    fn poorer_newcomer_evicts_richer_resident() {
        let mut t: Table = SubTable::with_hasher(PassThrough);
        // Key 8 homes at slot 1 and sits there with PSL 0.
        assert!(t.insert(8, "resident"));
        assert!(t.insert(0, "home"));
        // Key 1 homes at slot 0; at slot 1 it has walked further than the
        // resident key 8, so it takes the slot and 8 shifts forward.
        assert!(t.insert(1, "newcomer"));
        assert_eq!(slot_of(&t, 0), (0, 0));
        assert_eq!(slot_of(&t, 1), (1, 1));
        assert_eq!(slot_of(&t, 2), (8, 1));
        t.check_invariants();
    }

    #[test]
    fn remove_back_shifts_the_displaced_run() {
        let mut t: Table = SubTable::with_hasher(PassThrough);
        assert!(t.insert(8, "resident"));
        assert!(t.insert(0, "home"));
        assert!(t.insert(1, "newcomer"));
        assert_eq!(t.remove(&0), Some((0, "home")));
        // Both survivors are pulled one slot toward home.
        assert_eq!(slot_of(&t, 0), (1, 0));
        assert_eq!(slot_of(&t, 1), (8, 0));
        assert_eq!(t.len(), 2);
        t.check_invariants();
    }

    #[test]
    fn growth_triggers_at_half_load_and_rehashes() {
        let mut t: Table = SubTable::with_hasher(PassThrough);
        for k in 0..3 {
            assert!(t.insert(k, "v"));
        }
        assert_eq!(t.capacity(), 8);
        // The fourth insertion would reach half load; capacity doubles.
        assert!(t.insert(3, "v"));
        assert_eq!(t.capacity(), 16);
        assert_eq!(t.len(), 4);
        for k in 0..4 {
            assert!(t.contains_key(&k));
        }
        t.check_invariants();
    }

    #[test]
    fn clear_returns_to_initial_capacity() {
        let mut t: Table = SubTable::with_hasher(PassThrough);
        for k in 0..32 {
            assert!(t.insert(k, "v"));
        }
        assert!(t.capacity() > INITIAL_CAPACITY);
        t.clear();
        assert_eq!(t.capacity(), INITIAL_CAPACITY);
        assert_eq!(t.len(), 0);
        assert_eq!(t.iter().count(), 0);
        // The cleared table is fully usable again.
        assert!(t.insert(7, "w"));
        assert_eq!(t.get(&7), Some(&"w"));
        t.check_invariants();
    }

    #[test]
    fn lookup_stops_at_poorer_resident() {
        let mut t: Table = SubTable::with_hasher(PassThrough);
        assert!(t.insert(8, "a")); // home 1, PSL 0
        assert!(t.insert(16, "b")); // home 2, PSL 0
        // Key 9 homes at slot 1; slot 2 holds a resident with PSL 0, which
        // proves 9 is absent without walking to an empty slot.
        assert!(!t.contains_key(&9));
        assert_eq!(t.get(&9), None);
    }
}
