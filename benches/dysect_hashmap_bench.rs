use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use dysect_hashmap::DysectHashMap;
use std::collections::HashMap;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled_dysect(seed: u64, n: usize) -> DysectHashMap<String, u64> {
    let mut m = DysectHashMap::new();
    for (i, x) in lcg(seed).take(n).enumerate() {
        m.insert(key(x), i as u64);
    }
    m
}

fn filled_std(seed: u64, n: usize) -> HashMap<String, u64> {
    let mut m = HashMap::new();
    for (i, x) in lcg(seed).take(n).enumerate() {
        m.insert(key(x), i as u64);
    }
    m
}

// Precompute 10k query keys drawn from the map's own key stream.
fn hit_queries(seed: u64, n: usize) -> Vec<String> {
    let keys: Vec<String> = lcg(seed).take(n).map(key).collect();
    let mut s = 0x9e3779b97f4a7c15u64;
    (0..10_000)
        .map(|_| {
            s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
            keys[(s as usize) % n].clone()
        })
        .collect()
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("dysect::insert_fresh_100k", |b| {
        b.iter_batched(
            DysectHashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    c.bench_function("std::insert_fresh_100k", |b| {
        b.iter_batched(
            HashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit_10k(c: &mut Criterion) {
    c.bench_function("dysect::get_hit_10k_on_100k", |b| {
        let m = filled_dysect(7, 100_000);
        let queries = hit_queries(7, 100_000);
        b.iter(|| {
            for k in &queries {
                black_box(m.get(k.as_str()));
            }
        })
    });
    c.bench_function("std::get_hit_10k_on_100k", |b| {
        let m = filled_std(7, 100_000);
        let queries = hit_queries(7, 100_000);
        b.iter(|| {
            for k in &queries {
                black_box(m.get(k.as_str()));
            }
        })
    });
}

fn bench_get_miss_10k(c: &mut Criterion) {
    c.bench_function("dysect::get_miss_10k_on_100k", |b| {
        let m = filled_dysect(11, 100_000);
        b.iter(|| {
            let mut miss = lcg(0xdead_beef);
            for _ in 0..10_000 {
                let k = key(miss.next().unwrap());
                black_box(m.get(k.as_str()));
            }
        })
    });
    c.bench_function("std::get_miss_10k_on_100k", |b| {
        let m = filled_std(11, 100_000);
        b.iter(|| {
            let mut miss = lcg(0xdead_beef);
            for _ in 0..10_000 {
                let k = key(miss.next().unwrap());
                black_box(m.get(k.as_str()));
            }
        })
    });
}

fn bench_remove_10k(c: &mut Criterion) {
    let victims: Vec<String> = lcg(5).take(10_000).map(key).collect();
    c.bench_function("dysect::remove_10k_of_110k", |b| {
        b.iter_batched(
            || filled_dysect(5, 110_000),
            |mut m| {
                for k in &victims {
                    black_box(m.remove(k.as_str()));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    c.bench_function("std::remove_10k_of_110k", |b| {
        b.iter_batched(
            || filled_std(5, 110_000),
            |mut m| {
                for k in &victims {
                    black_box(m.remove(k.as_str()));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iter_all_100k(c: &mut Criterion) {
    c.bench_function("dysect::iter_all_100k", |b| {
        let m = filled_dysect(999, 100_000);
        b.iter(|| {
            let mut acc = 0u64;
            for (_, v) in &m {
                acc = acc.wrapping_add(*v);
            }
            black_box(acc)
        })
    });
    c.bench_function("std::iter_all_100k", |b| {
        let m = filled_std(999, 100_000);
        b.iter(|| {
            let mut acc = 0u64;
            for (_, v) in &m {
                acc = acc.wrapping_add(*v);
            }
            black_box(acc)
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_fresh_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_get_hit_10k, bench_get_miss_10k, bench_remove_10k, bench_iter_all_100k
}
criterion_main!(benches_insert, benches_ops);
