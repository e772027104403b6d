// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Returns `batches` copies of `0..n`, each shuffled with a fixed seed.
#[allow(dead_code)] // false-positive
pub fn shuffled_batches(n: u64, batches: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(n as usize * batches);
    for _ in 0..batches {
        let mut batch: Vec<f64> = (0..n).map(|v| v as f64).collect();
        batch.shuffle(&mut rng);
        values.extend(batch);
    }
    values
}

/// Returns `0..n` shuffled with a fixed seed.
#[allow(dead_code)] // false-positive
pub fn shuffled(n: u64, seed: u64) -> Vec<f64> {
    shuffled_batches(n, 1, seed)
}

/// Returns `n` values drawn from `0..distinct` with a fixed seed.
#[allow(dead_code)] // false-positive
pub fn low_cardinality(n: usize, distinct: u64, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..distinct) as f64).collect()
}

/// Returns the range of 1-based ranks `value` occupies in `sorted`.
#[allow(dead_code)] // false-positive
pub fn rank_range(sorted: &[f64], value: f64) -> (u64, u64) {
    let below = sorted.partition_point(|&v| v < value) as u64;
    let at_or_below = sorted.partition_point(|&v| v <= value) as u64;
    (below + 1, at_or_below)
}

/// Panics unless some rank of `value` in `sorted` lies within `tolerance` ranks of
/// `rank * sorted.len()`.
#[allow(dead_code)] // false-positive
pub fn assert_rank_within(sorted: &[f64], value: f64, rank: f64, tolerance: f64) {
    let n = sorted.len() as f64;
    let lower = ((rank * n) - tolerance).floor();
    let upper = ((rank * n) + tolerance).ceil();
    let (first, last) = rank_range(sorted, value);
    assert!(
        last as f64 >= lower && first as f64 <= upper,
        "value {value} has ranks [{first}, {last}], expected overlap with [{lower}, {upper}] \
         for rank {rank} of {n}"
    );
}

/// Returns a sorted copy of `values`.
#[allow(dead_code)] // false-positive
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Normalized ranks used by most accuracy checks.
#[allow(dead_code)] // false-positive
pub const RANKS: [f64; 13] = [
    0.0, 0.001, 0.01, 0.05, 0.1, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99, 0.999, 1.0,
];
