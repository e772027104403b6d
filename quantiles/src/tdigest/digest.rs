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

use std::io;
use std::io::Read;
use std::num::NonZeroU64;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::codec::SketchBytes;
use crate::codec::SketchReader;
use crate::codec::check_finite;
use crate::codec::check_nonzero;
use crate::codec::family::Family;
use crate::codec::make_error;
use crate::codec::read_len;
use crate::codec::read_preamble;
use crate::common::Compression;
use crate::common::check_rank;
use crate::error::Error;
use crate::tdigest::serialization::*;
use crate::tdigest::view::Centroid;
use crate::tdigest::view::DigestView;
use crate::tdigest::view::check_split_points;
use crate::tdigest::view::scale_function;

/// The default number of clusters.
pub const DEFAULT_CLUSTERS: u32 = 100;
/// The default lower bound of the relative centroid size.
pub const DEFAULT_MIN_EPS: f64 = 1e-4;

/// Hard limit on the number of centroids, relative to the configured clusters.
const MAX_CENTROIDS_FACTOR: f64 = 5.0;
/// Number of centroids kept after a recluster that could not get under the hard limit.
const SHRINK_CENTROIDS_FACTOR: f64 = 4.0;
/// Periodic recluster interval, relative to clusters (first pass) or centroids (later passes).
const RECLUSTER_INTERVAL_FACTOR: u64 = 10;

/// Configuration of a [`Digest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigestConfig {
    /// Target number of clusters. Larger values give better accuracy and use more memory.
    ///
    /// Must be at least 1. Defaults to [`DEFAULT_CLUSTERS`].
    pub clusters: u32,
    /// Lower bound of the relative size of any centroid, so that the tails are not kept as
    /// singletons forever.
    ///
    /// Must be finite and positive. Defaults to [`DEFAULT_MIN_EPS`].
    pub min_eps: f64,
    /// When to recluster. Defaults to [`Compression::Never`], which reclusters only when the
    /// centroid limit is exceeded.
    pub compression: Compression,
    /// Seed of the random generator used to break ties and to shuffle centroids while
    /// reclustering.
    pub seed: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        DigestConfig {
            clusters: DEFAULT_CLUSTERS,
            min_eps: DEFAULT_MIN_EPS,
            compression: Compression::Never,
            seed: 0,
        }
    }
}

impl DigestConfig {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.clusters == 0 {
            return Err(Error::invalid_config("clusters", "must be at least 1, got 0"));
        }
        if !(self.min_eps.is_finite() && self.min_eps > 0.0) {
            return Err(Error::invalid_config(
                "min_eps",
                format!("must be finite and positive, got {}", self.min_eps),
            ));
        }
        Ok(())
    }

    fn max_centroids(&self) -> usize {
        (self.clusters as f64 * MAX_CENTROIDS_FACTOR).ceil() as usize
    }
}

/// T-Digest that inserts each value into its nearest centroid.
///
/// A value joins the closest centroid(s) as long as they stay under a size bound that is small
/// in the tails and large around the median. Whatever does not fit starts a new centroid. The
/// centroids are periodically reclustered by reinserting them in random order, which keeps their
/// number bounded.
///
/// See the [module level documentation](super) for more.
#[derive(Debug, Clone)]
pub struct Digest {
    config: DigestConfig,
    rng: ChaCha8Rng,

    min: f64,
    max: f64,

    centroids: Vec<Centroid>,
    total_weight: u64,
    next_recluster: u64,
}

impl Default for Digest {
    fn default() -> Self {
        Digest::make(DigestConfig::default())
    }
}

impl Digest {
    /// Creates an empty digest.
    ///
    /// The fallible version of this method is [`Digest::try_new`].
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// # use quantiles::tdigest::{Digest, DigestConfig};
    /// let digest = Digest::new(DigestConfig {
    ///     clusters: 50,
    ///     ..Default::default()
    /// });
    /// assert_eq!(digest.params().clusters, 50);
    /// ```
    pub fn new(config: DigestConfig) -> Self {
        match Self::try_new(config) {
            Ok(digest) => digest,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates an empty digest.
    ///
    /// The panicking version of this method is [`Digest::new`].
    ///
    /// # Errors
    ///
    /// If `clusters` is zero or `min_eps` is not a positive finite number, returns
    /// [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument).
    pub fn try_new(config: DigestConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::make(config))
    }

    fn make(config: DigestConfig) -> Self {
        Digest {
            config,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            centroids: Vec::new(),
            total_weight: 0,
            next_recluster: RECLUSTER_INTERVAL_FACTOR * config.clusters as u64,
        }
    }

    /// Inserts a value.
    ///
    /// [f64::NAN], [f64::INFINITY], and [f64::NEG_INFINITY] values are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// # use quantiles::tdigest::Digest;
    /// let mut digest = Digest::default();
    /// assert!(digest.is_empty());
    /// for value in [10.0, 1.0, 2.0, 8.0, 9.0, 5.0, 6.0, 4.0, 7.0, 3.0] {
    ///     digest.insert(value);
    /// }
    /// assert!(!digest.is_empty());
    /// assert_eq!(digest.quantile(0.1), Some(2.0));
    /// ```
    pub fn insert(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.total_weight += 1;
        self.insert_weighted(value, 1, self.total_weight - 1);

        if self.centroids.len() > self.config.max_centroids()
            || self
                .config
                .compression
                .should_compress(self.total_weight, self.next_recluster)
        {
            self.recluster();
        }
    }

    /// Returns the configuration this digest was created with.
    pub fn params(&self) -> DigestConfig {
        self.config
    }

    /// Returns true if the digest has not seen any data.
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Returns the minimum inserted value, or `None` if the digest is empty.
    pub fn min_value(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.min)
        }
    }

    /// Returns the maximum inserted value, or `None` if the digest is empty.
    pub fn max_value(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.max)
        }
    }

    /// Returns the number of inserted values.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Returns the number of centroids currently kept.
    pub fn num_centroids(&self) -> usize {
        self.centroids.len()
    }

    /// Returns the approximate value at the given normalized rank.
    ///
    /// Rank 0 gives the minimum and rank 1 the maximum inserted value. Returns `None` if the
    /// digest is empty.
    ///
    /// # Panics
    ///
    /// Panics if `rank` is not in `[0.0, 1.0]`.
    pub fn quantile(&self, rank: f64) -> Option<f64> {
        check_rank(rank);
        self.view().quantile(rank)
    }

    /// Returns [`quantile`](Self::quantile) for every given rank.
    ///
    /// # Panics
    ///
    /// Panics if any rank is not in `[0.0, 1.0]`.
    pub fn quantiles(&self, ranks: &[f64]) -> Option<Vec<f64>> {
        ranks.iter().map(|&rank| self.quantile(rank)).collect()
    }

    /// Returns the approximate normalized rank of the given value.
    ///
    /// # Panics
    ///
    /// Panics if `value` is NaN.
    pub fn rank(&self, value: f64) -> Option<f64> {
        assert!(!value.is_nan(), "value must not be NaN");
        self.view().rank(value)
    }

    /// Returns the approximate cumulative distribution at the given split points, followed by a
    /// final 1.0.
    ///
    /// # Panics
    ///
    /// Panics unless the split points are unique, increasing and not NaN.
    pub fn cdf(&self, split_points: &[f64]) -> Option<Vec<f64>> {
        check_split_points(split_points);
        self.view().cdf(split_points)
    }

    fn view(&self) -> DigestView<'_> {
        DigestView {
            min: self.min,
            max: self.max,
            centroids: &self.centroids,
            total_weight: self.total_weight,
        }
    }

    /// Maximum weight of a centroid around normalized rank `q`.
    fn max_centroid_weight(&self, q: f64) -> u64 {
        let n = self.total_weight as f64;
        let compression = 2. * self.config.clusters as f64;
        let normalizer = scale_function::normalizer(compression, n.max(compression));
        let eps = scale_function::max(q.clamp(0., 1.), normalizer).max(2. * self.config.min_eps);
        ((n * eps) as u64).max(1)
    }

    /// Spreads `weight` copies of `value` over the nearest centroids and creates new centroids
    /// for what does not fit.
    ///
    /// `placed` is the weight held by the centroids before this call. It equals the total
    /// weight minus `weight`, except while reclustering.
    fn insert_weighted(&mut self, value: f64, weight: u64, mut placed: u64) {
        let right = self.centroids.partition_point(|c| c.mean < value);
        let mut weight_left: u64 = self.centroids[..right].iter().map(|c| c.weight.get()).sum();

        let min_distance = [right.checked_sub(1), Some(right)]
            .into_iter()
            .flatten()
            .filter_map(|i| self.centroids.get(i))
            .map(|c| c.distance(value))
            .fold(f64::INFINITY, f64::min);

        // (index, weight of all centroids before it)
        let mut candidates = Vec::new();
        let mut before = weight_left;
        for i in (0..right).rev() {
            let c = &self.centroids[i];
            if c.distance(value) != min_distance {
                break;
            }
            before -= c.weight.get();
            candidates.push((i, before));
        }
        let first = right - candidates.len();
        let mut before = weight_left;
        for i in right..self.centroids.len() {
            let c = &self.centroids[i];
            if c.distance(value) != min_distance {
                break;
            }
            candidates.push((i, before));
            before += c.weight.get();
        }
        let end = first + candidates.len();

        let mut remaining = weight;
        while !candidates.is_empty() && remaining > 0 {
            let (idx, before) = candidates.swap_remove(self.rng.gen_range(0..candidates.len()));
            let size = self.centroids[idx].weight.get();

            // the bound depends on the centroid's rank, which depends on what is added
            let mut add = remaining;
            loop {
                let mid = before as f64 + 0.5 * (size + add) as f64;
                let q = mid / (placed + add) as f64;
                let fits = self.max_centroid_weight(q).saturating_sub(size).min(add);
                if fits == add {
                    break;
                }
                add = fits;
            }

            if let Some(add) = NonZeroU64::new(add) {
                self.centroids[idx].add(Centroid::new(value, add));
                remaining -= add.get();
                placed += add.get();
                if idx < right {
                    weight_left += add.get();
                }
            }
        }
        // a grown candidate may pass its equal-mean neighbours, but never leaves its side
        self.centroids[first..right].sort_by(|a, b| a.mean.total_cmp(&b.mean));
        self.centroids[right..end].sort_by(|a, b| a.mean.total_cmp(&b.mean));

        while let Some(rest) = NonZeroU64::new(remaining) {
            let mut size = rest.get();
            loop {
                let q = (weight_left as f64 + 0.5 * size as f64) / (placed + size) as f64;
                let fits = self.max_centroid_weight(q).min(size);
                if fits == size {
                    break;
                }
                size = fits;
            }

            // max_centroid_weight is at least 1
            let size = NonZeroU64::new(size).unwrap_or(NonZeroU64::MIN);
            self.centroids.insert(right, Centroid::new(value, size));
            remaining -= size.get();
            placed += size.get();
        }
    }

    /// Reinserts all centroids in random order.
    fn recluster(&mut self) {
        if self.total_weight >= self.next_recluster {
            self.next_recluster += RECLUSTER_INTERVAL_FACTOR * self.centroids.len() as u64;
        }

        let before = self.centroids.len();
        let mut old = std::mem::take(&mut self.centroids);
        self.centroids.reserve(before);
        let mut placed = 0;
        for i in 0..old.len() {
            let j = self.rng.gen_range(i..old.len());
            old.swap(i, j);
            let weight = old[i].weight.get();
            self.insert_weighted(old[i].mean, weight, placed);
            placed += weight;
        }

        let max_centroids = self.config.max_centroids();
        if self.centroids.len() > max_centroids {
            let target = (self.config.clusters as f64 * SHRINK_CENTROIDS_FACTOR).ceil() as usize;
            tracing::debug!(
                centroids = self.centroids.len(),
                target,
                "recluster left too many centroids; merging smallest neighbours"
            );
            self.merge_smallest(target.max(1));
        }

        tracing::debug!(
            before,
            after = self.centroids.len(),
            total_weight = self.total_weight,
            next_recluster = self.next_recluster,
            "reclustered digest"
        );
    }

    /// Merges the adjacent pair with the smallest combined weight until at most `target`
    /// centroids remain.
    fn merge_smallest(&mut self, target: usize) {
        while self.centroids.len() > target {
            let Some(i) = (0..self.centroids.len() - 1).min_by_key(|&i| {
                self.centroids[i].weight.get() + self.centroids[i + 1].weight.get()
            }) else {
                return;
            };
            let right = self.centroids.remove(i + 1);
            self.centroids[i].add(right);
        }
    }

    /// Serializes this digest to bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use quantiles::tdigest::Digest;
    /// let mut digest = Digest::default();
    /// digest.insert(1.0);
    /// let bytes = digest.serialize();
    /// let decoded = Digest::deserialize(&bytes).unwrap();
    /// assert_eq!(decoded.max_value(), Some(1.0));
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        // preamble, clusters, min_eps, seed, rng position, total weight, next recluster
        let mut total_size = 4 + 4 + 8 + 8 + 16 + 8 + 8;
        if !self.is_empty() {
            // min, max, number of centroids and the centroids
            total_size += 8 + 8 + 4 + self.centroids.len() * (8 + 8);
        }

        let mut bytes = SketchBytes::with_capacity(total_size);
        bytes.write_preamble(
            &Family::DIGEST,
            SERIAL_VERSION,
            if self.is_empty() { FLAGS_IS_EMPTY } else { 0 },
            self.config.compression.to_byte(),
        );
        bytes.write_u32_le(self.config.clusters);
        bytes.write_f64_le(self.config.min_eps);
        bytes.write_u64_le(self.config.seed);
        bytes.write_u128_le(self.rng.get_word_pos());
        bytes.write_u64_le(self.total_weight);
        bytes.write_u64_le(self.next_recluster);
        if self.is_empty() {
            return bytes.into_bytes();
        }
        bytes.write_f64_le(self.min);
        bytes.write_f64_le(self.max);
        bytes.write_u32_le(self.centroids.len() as u32);
        for centroid in &self.centroids {
            bytes.write_f64_le(centroid.mean);
            bytes.write_u64_le(centroid.weight.get());
        }
        bytes.into_bytes()
    }

    /// Writes the serialized digest to `writer`.
    pub fn save<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.serialize())
    }

    /// Deserializes a digest from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidData`](crate::error::ErrorKind::InvalidData) if the bytes are
    /// truncated or do not describe a valid digest.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::load(bytes)
    }

    /// Reads a digest from `reader`, consuming exactly the bytes written by
    /// [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidData`](crate::error::ErrorKind::InvalidData) if the stream
    /// ends early or does not describe a valid digest.
    pub fn load<R: Read>(reader: R) -> Result<Self, Error> {
        let mut reader = SketchReader::new(reader);
        let (flags, policy) = read_preamble(&mut reader, &Family::DIGEST, SERIAL_VERSION)?;
        let config = DigestConfig {
            clusters: reader.read_u32_le().map_err(make_error("clusters"))?,
            min_eps: reader.read_f64_le().map_err(make_error("min_eps"))?,
            compression: Compression::from_byte(policy)?,
            seed: reader.read_u64_le().map_err(make_error("seed"))?,
        };
        config
            .validate()
            .map_err(|err| Error::malformed(err.message()))?;
        let word_pos = reader.read_u128_le().map_err(make_error("rng_position"))?;
        let total_weight = reader.read_u64_le().map_err(make_error("total_weight"))?;
        let next_recluster = reader.read_u64_le().map_err(make_error("next_recluster"))?;

        let mut digest = Digest::make(config);
        digest.rng.set_word_pos(word_pos);
        digest.next_recluster = next_recluster;
        if flags & FLAGS_IS_EMPTY != 0 {
            if total_weight != 0 {
                return Err(Error::malformed(format!(
                    "empty digest with total weight {total_weight}"
                )));
            }
            return Ok(digest);
        }

        let min = reader.read_f64_le().map_err(make_error("min"))?;
        let max = reader.read_f64_le().map_err(make_error("max"))?;
        check_finite(min, "min")?;
        check_finite(max, "max")?;
        let num_centroids = read_len(&mut reader, "num_centroids", config.max_centroids())?;
        if num_centroids == 0 {
            return Err(Error::malformed("non-empty digest without centroids"));
        }
        let mut centroids = Vec::with_capacity(num_centroids.min(4096));
        let mut weight_sum = 0u64;
        for _ in 0..num_centroids {
            let mean = reader.read_f64_le().map_err(make_error("mean"))?;
            let weight = reader.read_u64_le().map_err(make_error("weight"))?;
            check_finite(mean, "centroid mean")?;
            let weight = check_nonzero(weight, "centroid weight")?;
            if centroids.last().is_some_and(|c: &Centroid| c.mean > mean) {
                return Err(Error::malformed("centroids are not sorted"));
            }
            if mean < min || mean > max {
                return Err(Error::malformed("centroid mean outside of [min, max]"));
            }
            weight_sum = weight_sum.saturating_add(weight.get());
            centroids.push(Centroid::new(mean, weight));
        }
        if weight_sum != total_weight {
            return Err(Error::malformed(format!(
                "centroid weights sum to {weight_sum}, expected {total_weight}"
            )));
        }

        digest.min = min;
        digest.max = max;
        digest.centroids = centroids;
        digest.total_weight = total_weight;
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bound_is_small_in_tails() {
        let mut digest = Digest::default();
        for i in 0..100_000 {
            digest.insert(i as f64);
        }
        let tail = digest.max_centroid_weight(0.0001);
        let median = digest.max_centroid_weight(0.5);
        assert!(tail < median, "tail {tail} median {median}");
        assert!(digest.num_centroids() <= digest.config.max_centroids());
    }

    #[test]
    fn test_ties_join_centroids_on_both_sides() {
        let mut digest = Digest::default();
        for _ in 0..50 {
            digest.insert(1.0);
            digest.insert(3.0);
        }
        for _ in 0..100 {
            digest.insert(2.0);
        }
        assert_eq!(digest.total_weight(), 200);
        let weight: u64 = digest.centroids.iter().map(|c| c.weight.get()).sum();
        assert_eq!(weight, 200);
        assert!(digest.centroids.windows(2).all(|w| w[0].mean <= w[1].mean));
    }

    #[test]
    fn test_centroids_stay_sorted_after_duplicates() {
        for seed in 0..20 {
            let mut digest = Digest::new(DigestConfig {
                seed,
                ..Default::default()
            });
            for _ in 0..5000 {
                digest.insert(1.0);
            }
            assert!(digest.num_centroids() > 1);
            for _ in 0..200 {
                digest.insert(2.0);
            }
            for _ in 0..200 {
                digest.insert(0.0);
            }
            assert!(
                digest.centroids.windows(2).all(|w| w[0].mean <= w[1].mean),
                "seed {seed}: {:?}",
                digest.centroids
            );
            let weight: u64 = digest.centroids.iter().map(|c| c.weight.get()).sum();
            assert_eq!(weight, 5400);
        }
    }

    #[test]
    fn test_merge_smallest() {
        let mut digest = Digest::default();
        for value in [1.0, 2.0, 3.0, 4.0] {
            digest.insert(value);
        }
        digest.merge_smallest(2);
        assert_eq!(digest.num_centroids(), 2);
        assert_eq!(digest.total_weight(), 4);
    }
}
