//! A single cell of a subtable's flat slot array.
//!
//! Slots are stored inline in a contiguous array; a slot either holds a
//! key/value pair together with its probe sequence length (PSL, the
//! forward distance from the pair's home index) or is empty.

/// One cell of the open-addressed array.
#[derive(Clone, Debug)]
pub(crate) enum Slot<K, V> {
    Empty,
    Occupied { key: K, value: V, psl: usize },
}

impl<K, V> Slot<K, V> {
    /// Consumes the slot, yielding the payload of an occupied slot.
    #[inline]
    pub(crate) fn into_pair(self) -> Option<(K, V)> {
        match self {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            Slot::Empty => None,
        }
    }
}
