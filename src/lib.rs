//! dysect-hashmap: a two-level associative container.
//!
//! The map is a fixed directory of eight subtables, each an independent
//! Robin Hood open-addressed flat table. An operation hashes its key once,
//! routes on the low bits of the hash and forwards to the selected
//! subtable, which reduces the remaining bits against its own capacity.
//! A subtable that exceeds half load doubles on its own; the rest of the
//! directory keeps its size, which is what buys the lower memory overhead
//! compared to one monolithic table.
//!
//! [`SubTable`] is exported as a stand-alone Robin Hood hash table with
//! the same operation family as the composite [`DysectHashMap`].

pub mod dysect_hash_map;
mod slot;
pub mod sub_table;

mod dysect_hash_map_proptest;
mod sub_table_proptest;

pub use dysect_hash_map::DysectHashMap;
pub use sub_table::{LookupError, SubTable};

/// Number of low hash bits consumed by the directory selector.
pub(crate) const DIRECTORY_BITS: u32 = 3;

/// Width of the top-level directory; fixed at compile time.
pub(crate) const DIRECTORY_SIZE: usize = 1 << DIRECTORY_BITS;
