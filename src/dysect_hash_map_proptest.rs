#![cfg(test)]

// Property tests for DysectHashMap kept inside the crate so they can reach
// the directory-level invariant checker (routing consistency, aggregate
// size, plus every subtable's structural invariants).

use crate::dysect_hash_map::DysectHashMap;
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i64),
    Remove(usize),
    Get(usize),
    GetOrInsertDefault(usize),
    Iterate,
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        4 => (0usize..64, any::<i64>()).prop_map(|(i, v)| Op::Insert(i, v)),
        3 => (0usize..64).prop_map(Op::Remove),
        2 => (0usize..64).prop_map(Op::Get),
        2 => (0usize..64).prop_map(Op::GetOrInsertDefault),
        1 => Just(Op::Iterate),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..120)
}

fn run_scenario<S>(
    mut sut: DysectHashMap<u64, i64, S>,
    pool: &[u64],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    let mut model: HashMap<u64, i64> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = pool[i % pool.len()];
                let already = model.contains_key(&k);
                prop_assert_eq!(sut.insert(k, v), !already);
                model.entry(k).or_insert(v);
            }
            Op::Remove(i) => {
                let k = pool[i % pool.len()];
                prop_assert_eq!(sut.remove(&k), model.remove(&k).map(|v| (k, v)));
            }
            Op::Get(i) => {
                let k = pool[i % pool.len()];
                prop_assert_eq!(sut.get(&k), model.get(&k));
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            Op::GetOrInsertDefault(i) => {
                let k = pool[i % pool.len()];
                let got = *sut.get_or_insert_default(k);
                prop_assert_eq!(got, *model.entry(k).or_insert(0));
            }
            Op::Iterate => {
                let mut entries: Vec<(u64, i64)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
                entries.sort_unstable();
                let mut expected: Vec<(u64, i64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
                expected.sort_unstable();
                prop_assert_eq!(entries, expected);
                prop_assert_eq!(sut.iter().len(), model.len());
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }
        sut.check_invariants();
        prop_assert_eq!(sut.len(), model.len());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_directory_invariants(
        pool in proptest::collection::vec(any::<u64>(), 1..=16),
        ops in arb_ops(),
    ) {
        run_scenario(DysectHashMap::new(), &pool, ops)?;
    }

    // Identity hashing pins each key's route, so skewed pools concentrate
    // whole clusters in single subtables.
    #[test]
    fn prop_directory_invariants_identity_hash(
        pool in proptest::collection::vec(0u64..32, 1..=16),
        ops in arb_ops(),
    ) {
        run_scenario(DysectHashMap::with_hasher(Identity), &pool, ops)?;
    }

    // A clone must be fully independent of its source: mutations applied
    // to the original afterwards never show through.
    #[test]
    fn prop_clone_independence(
        pool in proptest::collection::vec(any::<u64>(), 1..=16),
        build in arb_ops(),
        mutate in arb_ops(),
    ) {
        let mut original: DysectHashMap<u64, i64> = DysectHashMap::new();
        run_scenario_into(&mut original, &pool, build)?;

        let snapshot: HashMap<u64, i64> = original.iter().map(|(k, v)| (*k, *v)).collect();
        let copy = original.clone();

        run_scenario_into(&mut original, &pool, mutate)?;

        copy.check_invariants();
        prop_assert_eq!(copy.len(), snapshot.len());
        for (k, v) in copy.iter() {
            prop_assert_eq!(snapshot.get(k), Some(v));
        }
    }
}

// Applies ops without model parity checks; used where the caller only
// needs a populated map.
fn run_scenario_into<S>(
    sut: &mut DysectHashMap<u64, i64, S>,
    pool: &[u64],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    for op in ops {
        match op {
            Op::Insert(i, v) => {
                sut.insert(pool[i % pool.len()], v);
            }
            Op::Remove(i) => {
                sut.remove(&pool[i % pool.len()]);
            }
            Op::Get(i) => {
                let _ = sut.get(&pool[i % pool.len()]);
            }
            Op::GetOrInsertDefault(i) => {
                let _ = sut.get_or_insert_default(pool[i % pool.len()]);
            }
            Op::Iterate => {
                let _ = sut.iter().count();
            }
            Op::Clear => sut.clear(),
        }
    }
    sut.check_invariants();
    Ok(())
}

#[derive(Clone, Default)]
struct Identity;

struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
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

impl BuildHasher for Identity {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}
