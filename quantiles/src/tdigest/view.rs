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

//! Read-only queries over a sorted centroid sequence.

use std::cmp::Ordering;
use std::convert::identity;
use std::num::NonZeroU64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Centroid {
    pub(super) mean: f64,
    pub(super) weight: NonZeroU64,
}

impl Centroid {
    pub(super) fn new(mean: f64, weight: NonZeroU64) -> Self {
        Centroid { mean, weight }
    }

    /// Merges `other` into this centroid, moving the mean by the weight ratio.
    pub(super) fn add(&mut self, other: Centroid) {
        let (self_weight, other_weight) = (self.weight(), other.weight());
        let total_weight = self_weight + other_weight;
        self.weight = self.weight.saturating_add(other.weight.get());

        let (self_mean, other_mean) = (self.mean, other.mean);
        let ratio_other = other_weight / total_weight;
        let delta = other_mean - self_mean;
        let mean = if delta.is_finite() {
            delta.mul_add(ratio_other, self_mean)
        } else {
            let ratio_self = self_weight / total_weight;
            self_mean.mul_add(ratio_self, other_mean * ratio_other)
        };
        // rounding must not move the mean outside of the merged range
        self.mean = mean.clamp(self_mean.min(other_mean), self_mean.max(other_mean));

        debug_assert!(
            self.mean.is_finite(),
            "Centroid's mean must be finite; self: {}, other: {}",
            self_mean,
            other_mean
        );
    }

    pub(super) fn distance(&self, value: f64) -> f64 {
        (self.mean - value).abs()
    }

    pub(super) fn weight(&self) -> f64 {
        self.weight.get() as f64
    }
}

pub(super) struct DigestView<'a> {
    pub(super) min: f64,
    pub(super) max: f64,
    pub(super) centroids: &'a [Centroid],
    pub(super) total_weight: u64,
}

impl DigestView<'_> {
    pub(super) fn cdf(&self, split_points: &[f64]) -> Option<Vec<f64>> {
        check_split_points(split_points);

        if self.centroids.is_empty() {
            return None;
        }

        let mut ranks = Vec::with_capacity(split_points.len() + 1);
        for &p in split_points {
            match self.rank(p) {
                Some(rank) => ranks.push(rank),
                None => unreachable!("checked non-empty above"),
            }
        }
        ranks.push(1.0);
        Some(ranks)
    }

    pub(super) fn rank(&self, value: f64) -> Option<f64> {
        debug_assert!(!value.is_nan(), "value must not be NaN");

        if self.centroids.is_empty() {
            return None;
        }
        if value < self.min {
            return Some(0.0);
        }
        if value > self.max {
            return Some(1.0);
        }
        // one centroid and value == min == max
        if self.centroids.len() == 1 {
            return Some(0.5);
        }

        let total_weight = self.total_weight as f64;
        let num_centroids = self.centroids.len();

        // left tail
        let first_mean = self.centroids[0].mean;
        if value < first_mean {
            if first_mean - self.min > 0. {
                return Some(if value == self.min {
                    0.5 / total_weight
                } else {
                    (1. + (((value - self.min) / (first_mean - self.min))
                        * ((self.centroids[0].weight() / 2.) - 1.)))
                        / total_weight
                });
            }
            return Some(0.);
        }

        // right tail
        let last_mean = self.centroids[num_centroids - 1].mean;
        if value > last_mean {
            if self.max - last_mean > 0. {
                return Some(if value == self.max {
                    1. - (0.5 / total_weight)
                } else {
                    1.0 - ((1.0
                        + (((self.max - value) / (self.max - last_mean))
                            * ((self.centroids[num_centroids - 1].weight() / 2.) - 1.)))
                        / total_weight)
                });
            }
            return Some(1.);
        }

        let mut lower = self
            .centroids
            .binary_search_by(|c| centroid_lower_bound(c, value))
            .unwrap_or_else(identity);
        let mut upper = self
            .centroids
            .binary_search_by(|c| centroid_upper_bound(c, value))
            .unwrap_or_else(identity);
        // value lies within [first_mean, last_mean] here, so both searches land inside
        if value < self.centroids[lower].mean {
            lower -= 1;
        }
        if (upper == num_centroids) || (self.centroids[upper - 1].mean >= value) {
            upper -= 1;
        }

        let weight_below: f64 = self.centroids[..lower].iter().map(Centroid::weight).sum::<f64>()
            + self.centroids[lower].weight() / 2.;
        let weight_delta: f64 = self.centroids[lower..upper]
            .iter()
            .map(Centroid::weight)
            .sum::<f64>()
            - self.centroids[lower].weight() / 2.
            + self.centroids[upper].weight() / 2.;

        Some(
            if self.centroids[upper].mean - self.centroids[lower].mean > 0. {
                (weight_below
                    + (weight_delta * (value - self.centroids[lower].mean)
                        / (self.centroids[upper].mean - self.centroids[lower].mean)))
                    / total_weight
            } else {
                (weight_below + weight_delta / 2.) / total_weight
            },
        )
    }

    pub(super) fn quantile(&self, rank: f64) -> Option<f64> {
        debug_assert!((0.0..=1.0).contains(&rank), "rank must be in [0.0, 1.0]");

        if self.centroids.is_empty() {
            return None;
        }

        if self.centroids.len() == 1 {
            return Some(self.centroids[0].mean);
        }

        // at least 2 centroids
        let total_weight = self.total_weight as f64;
        let num_centroids = self.centroids.len();
        let weight = rank * total_weight;
        if weight < 1. {
            return Some(self.min);
        }
        if weight > total_weight - 1. {
            return Some(self.max);
        }
        let first_weight = self.centroids[0].weight();
        if first_weight > 1. && weight < first_weight / 2. {
            return Some(
                self.min
                    + (((weight - 1.) / ((first_weight / 2.) - 1.))
                        * (self.centroids[0].mean - self.min)),
            );
        }
        let last_weight = self.centroids[num_centroids - 1].weight();
        if last_weight > 1. && (total_weight - weight <= last_weight / 2.) {
            return Some(
                self.max
                    - (((total_weight - weight - 1.) / ((last_weight / 2.) - 1.))
                        * (self.max - self.centroids[num_centroids - 1].mean)),
            );
        }

        // interpolate between extremes
        let mut weight_so_far = first_weight / 2.;
        for pair in self.centroids.windows(2) {
            let (left, right) = (&pair[0], &pair[1]);
            let dw = (left.weight() + right.weight()) / 2.;
            if weight_so_far + dw > weight {
                // the target weight is between the two centroids
                let mut left_weight = 0.;
                if left.weight.get() == 1 {
                    if weight - weight_so_far < 0.5 {
                        return Some(left.mean);
                    }
                    left_weight = 0.5;
                }
                let mut right_weight = 0.;
                if right.weight.get() == 1 {
                    if weight_so_far + dw - weight <= 0.5 {
                        return Some(right.mean);
                    }
                    right_weight = 0.5;
                }
                // each mean is weighted by the distance to the other one
                let w1 = weight - weight_so_far - left_weight;
                let w2 = weight_so_far + dw - weight - right_weight;
                return Some(weighted_average(left.mean, w2, right.mean, w1));
            }
            weight_so_far += dw;
        }

        let last = &self.centroids[num_centroids - 1];
        let w1 = weight - total_weight + last.weight() / 2.;
        let w2 = last.weight() / 2. - w1;
        Some(weighted_average(last.mean, w2, self.max, w1))
    }
}

/// Checks the sequential validity of the given array of double values.
/// They must be unique, monotonically increasing and not NaN.
#[track_caller]
pub(super) fn check_split_points(split_points: &[f64]) {
    let len = split_points.len();
    if len == 1 && split_points[0].is_nan() {
        panic!("split_points must not contain NaN values: {split_points:?}");
    }
    for i in 0..len.saturating_sub(1) {
        if split_points[i] < split_points[i + 1] {
            // we must use this positive condition because NaN comparisons are always false
            continue;
        }
        panic!("split_points must be unique and monotonically increasing: {split_points:?}");
    }
}

fn centroid_lower_bound(c: &Centroid, value: f64) -> Ordering {
    if c.mean < value {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn centroid_upper_bound(c: &Centroid, value: f64) -> Ordering {
    if c.mean > value {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// Generates cluster sizes proportional to `q*(1-q)`.
///
/// The use of a normalizing function results in a strictly bounded number of clusters no matter
/// how many samples.
pub(super) mod scale_function {
    pub(in crate::tdigest) fn max(q: f64, normalizer: f64) -> f64 {
        q * (1. - q) / normalizer
    }

    pub(in crate::tdigest) fn normalizer(compression: f64, n: f64) -> f64 {
        compression / z(compression, n)
    }

    fn z(compression: f64, n: f64) -> f64 {
        4. * (n / compression).ln() + 24.
    }
}

const fn weighted_average(x1: f64, w1: f64, x2: f64, w2: f64) -> f64 {
    (x1 * w1 + x2 * w2) / (w1 + w2)
}
