//! Criterion benchmarks, built with the `bench` feature.
//!
//! Run with: cargo bench -p temporal_median --features bench

use std::hint::black_box;

use common::Buffer3;
use criterion::{BenchmarkId, Criterion, Throughput};

use crate::rank_map::RankMap;
use crate::scheduler::{correct_series, subtract_bracket};
use crate::tracker::{HuangTracker, HungTracker, MedianTracker, Strategy};

/// Deterministic camera-like noise: a flat background with sparse bright events.
fn synthetic_series(len: usize, seed: u64) -> Vec<u16> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let noise = (state % 200) as u16;
            let event = if state % 97 == 0 { 3000 } else { 0 };
            400 + noise + event
        })
        .collect()
}

fn ranked_series(values: &[u16]) -> (RankMap, Vec<u16>) {
    // Bench input is tiny and well-formed.
    let map = RankMap::build(values).expect("rank map");
    let ranked = values.iter().map(|&v| map.forward(v as u32) as u16).collect();
    (map, ranked)
}

fn bench_tracker<T: MedianTracker>(
    group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>,
    name: &str,
    window: usize,
    map: &RankMap,
    ranked: &[u16],
) {
    let mut out = vec![0u16; ranked.len()];
    let mut tracker = T::new(window, map.max_rank());
    group.bench_with_input(BenchmarkId::new(name, window), &window, |b, &window| {
        b.iter(|| {
            correct_series(
                &mut tracker,
                black_box(ranked),
                window,
                map.inverse_table(),
                &mut out,
            );
            black_box(&out);
        })
    });
}

/// Huang vs Hung on a single long series, for several window widths.
pub fn bench_trackers(c: &mut Criterion) {
    let values = synthetic_series(20_000, 7);
    let (map, ranked) = ranked_series(&values);

    let mut group = c.benchmark_group("tracker");
    group.throughput(Throughput::Elements(values.len() as u64));
    for window in [11, 51, 201] {
        bench_tracker::<HuangTracker>(&mut group, "huang", window, &map, &ranked);
        bench_tracker::<HungTracker>(&mut group, "hung", window, &map, &ranked);
    }
    group.finish();
}

/// One whole bracket: ranking, parallel correction and write-back.
pub fn bench_bracket(c: &mut Criterion) {
    let (width, height, frames) = (128, 128, 200);
    let data = synthetic_series(width * height * frames, 11);
    let volume = Buffer3::new(width, height, frames, data);
    let pool = rayon::ThreadPoolBuilder::new()
        .build()
        .expect("thread pool");

    let mut group = c.benchmark_group("bracket");
    group.sample_size(10);
    group.throughput(Throughput::Elements(volume.len() as u64));
    for strategy in [Strategy::Huang, Strategy::Hung] {
        group.bench_function(BenchmarkId::new(strategy.to_string(), 51), |b| {
            b.iter_batched_ref(
                || volume.clone(),
                |v| subtract_bracket(v, 51, strategy, &pool).expect("bracket"),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}
