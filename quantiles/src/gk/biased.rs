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

use crate::codec::SketchBytes;
use crate::codec::SketchReader;
use crate::codec::family::Family;
use crate::codec::make_error;
use crate::codec::read_preamble;
use crate::common::Compression;
use crate::common::check_eps;
use crate::common::check_rank;
use crate::error::Error;
use crate::gk::serialization::*;
use crate::gk::tuple;
use crate::gk::tuple::Tuple;

/// Configuration of a [`BiasedGkSketch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasedGkConfig {
    /// Relative rank error. Must be in `(0, 0.5)`. Defaults to 0.1.
    pub eps: f64,
    /// The rank the sketch is most accurate around. Values up to 0.5 bias the sketch towards
    /// low ranks, larger values towards high ranks.
    ///
    /// Must be in `[0, 1]`. Defaults to 0.01.
    pub target_prob: f64,
    /// When to compress. Defaults to [`Compression::Periodic`].
    pub compression: Compression,
    /// Only merge a tuple into a neighbour of the same or a higher band. Defaults to true.
    pub use_bands: bool,
}

impl Default for BiasedGkConfig {
    fn default() -> Self {
        BiasedGkConfig {
            eps: 0.1,
            target_prob: 0.01,
            compression: Compression::Periodic,
            use_bands: true,
        }
    }
}

impl BiasedGkConfig {
    fn validate(&self) -> Result<(), Error> {
        check_eps(self.eps, "eps")?;
        if !(0.0..=1.0).contains(&self.target_prob) {
            return Err(Error::invalid_config(
                "target_prob",
                format!("must be in [0, 1], got {}", self.target_prob),
            ));
        }
        Ok(())
    }

    fn is_high(&self) -> bool {
        self.target_prob > 0.5
    }
}

/// Greenwald-Khanna summary whose rank error shrinks towards one end of the rank domain.
///
/// For a sketch biased towards low ranks, the value returned for rank `p` has a true rank
/// within `max(p, target_prob) * eps * n` of `p * n`. A sketch with `target_prob > 0.5` mirrors
/// this: the error is `max(1 - p, 1 - target_prob) * eps * n`. This makes it cheap to track
/// tail percentiles such as p99 precisely.
///
/// The summary stays small on shuffled streams. Adversarial orders can defeat compression:
/// when rising values on the biased side alternate with falling values on the other side,
/// each insert lands next to a fresh tuple that has no room to absorb it, and about half of
/// the values are kept as tuples whatever the [`Compression`] policy. The error bound still
/// holds.
///
/// # Examples
///
/// ```
/// # use quantiles::gk::{BiasedGkConfig, BiasedGkSketch};
/// let mut p99 = BiasedGkSketch::new(BiasedGkConfig {
///     eps: 0.1,
///     target_prob: 0.99,
///     ..Default::default()
/// });
/// for i in 1..=10_000 {
///     p99.insert(i as f64);
/// }
/// let value = p99.quantile(0.99).unwrap();
/// assert!((9880.0..=9920.0).contains(&value));
/// ```
#[derive(Debug, Clone)]
pub struct BiasedGkSketch {
    config: BiasedGkConfig,
    /// `target_prob` folded into the low half of the rank domain.
    p0: f64,
    /// Tuples ordered by key, which is the value negated for high-biased sketches.
    tuples: Vec<Tuple>,
    count: u64,
    next_compress: u64,
}

impl Default for BiasedGkSketch {
    fn default() -> Self {
        BiasedGkSketch::make(BiasedGkConfig::default())
    }
}

impl BiasedGkSketch {
    /// Creates an empty sketch.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: BiasedGkConfig) -> Self {
        match Self::try_new(config) {
            Ok(sketch) => sketch,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates an empty sketch.
    ///
    /// # Errors
    ///
    /// If `eps` is not in `(0, 0.5)` or `target_prob` is not in `[0, 1]`, returns
    /// [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument).
    pub fn try_new(config: BiasedGkConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::make(config))
    }

    fn make(config: BiasedGkConfig) -> Self {
        let p0 = if config.is_high() {
            1. - config.target_prob
        } else {
            config.target_prob
        };
        BiasedGkSketch {
            config,
            p0,
            tuples: Vec::new(),
            count: 0,
            next_compress: first_compress(config.eps),
        }
    }

    fn key(&self, value: f64) -> f64 {
        if self.config.is_high() { -value } else { value }
    }

    /// Inserts a value.
    ///
    /// [f64::NAN], [f64::INFINITY], and [f64::NEG_INFINITY] values are ignored.
    pub fn insert(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        let key = self.key(value);
        self.count += 1;
        let pos = self.tuples.partition_point(|t| t.value <= key);
        if pos == 0 || pos == self.tuples.len() {
            self.tuples.insert(pos, Tuple::exact(key));
        } else {
            let rank: u64 = self.tuples[..pos].iter().map(|t| t.g).sum();
            let max_uncert = self.max_uncert(rank as f64);
            let right = &mut self.tuples[pos];
            if (1 + right.g + right.delta) as f64 <= max_uncert {
                right.g += 1;
            } else {
                let delta = (max_uncert as u64).saturating_sub(1);
                self.tuples.insert(pos, Tuple { value: key, g: 1, delta });
            }
        }

        if self
            .config
            .compression
            .should_compress(self.count, self.next_compress)
        {
            self.compress();
        }
    }

    /// Merges neighbouring tuples wherever that keeps the error bound.
    pub fn compress(&mut self) {
        let len = self.tuples.len();
        if len >= 3 {
            let mut merged = Vec::with_capacity(len);
            merged.push(self.tuples[0]);
            // values before `current`
            let mut min_rank = self.tuples[0].g;
            let mut current = self.tuples[1];
            for &next in &self.tuples[2..] {
                let max_uncert = self.max_uncert(min_rank as f64);
                let mergeable = (current.g + next.g + next.delta) as f64 <= max_uncert;
                let same_band = !self.config.use_bands
                    || self.band(&current, min_rank) <= self.band(&next, min_rank + current.g);
                if mergeable && same_band {
                    current = Tuple {
                        g: current.g + next.g,
                        ..next
                    };
                } else {
                    min_rank += current.g;
                    merged.push(current);
                    current = next;
                }
            }
            merged.push(current);

            tracing::trace!(
                before = len,
                after = merged.len(),
                count = self.count,
                "compressed biased GK"
            );
            self.tuples = merged;
        }

        if self.count >= self.next_compress {
            self.next_compress += self.tuples.len() as u64;
        }
    }

    /// Maximum `g + delta` of a tuple preceded by `rank` values.
    fn max_uncert(&self, rank: f64) -> f64 {
        let n = self.count as f64;
        let eps = self.config.eps;
        if rank <= self.p0 * n {
            2. * eps * self.p0 * n
        } else {
            2. * eps * rank
        }
    }

    fn band(&self, tuple: &Tuple, min_rank: u64) -> u32 {
        tuple::band(tuple.delta, self.max_uncert(min_rank as f64) as u64)
    }

    /// Returns the configuration this sketch was created with.
    pub fn params(&self) -> BiasedGkConfig {
        self.config
    }

    /// Returns true if the sketch has not seen any data.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the number of inserted values.
    pub fn total_count(&self) -> u64 {
        self.count
    }

    /// Returns the number of tuples currently kept.
    pub fn num_tuples(&self) -> usize {
        self.tuples.len()
    }

    /// Returns the minimum inserted value.
    pub fn min_value(&self) -> Option<f64> {
        let end = if self.config.is_high() {
            self.tuples.last()
        } else {
            self.tuples.first()
        };
        end.map(|t| self.key(t.value))
    }

    /// Returns the maximum inserted value.
    pub fn max_value(&self) -> Option<f64> {
        let end = if self.config.is_high() {
            self.tuples.first()
        } else {
            self.tuples.last()
        };
        end.map(|t| self.key(t.value))
    }

    /// Returns an inserted value close to the given normalized rank, or `None` if the sketch is
    /// empty.
    ///
    /// # Panics
    ///
    /// Panics if `rank` is not in `[0.0, 1.0]`.
    pub fn quantile(&self, rank: f64) -> Option<f64> {
        check_rank(rank);
        if self.is_empty() {
            return None;
        }

        let n = self.count as f64;
        let target = if self.config.is_high() {
            (1. - rank) * n
        } else {
            rank * n
        };
        let eps_rank = self.max_uncert(target) / 2.;
        let key = tuple::query(&self.tuples, target, eps_rank);
        Some(self.key(key))
    }

    /// Returns [`quantile`](Self::quantile) for every given rank.
    ///
    /// # Panics
    ///
    /// Panics if any rank is not in `[0.0, 1.0]`.
    pub fn quantiles(&self, ranks: &[f64]) -> Option<Vec<f64>> {
        ranks.iter().map(|&rank| self.quantile(rank)).collect()
    }

    /// Returns the estimated normalized rank of `value`, or `None` if the sketch is empty.
    ///
    /// # Panics
    ///
    /// Panics if `value` is NaN.
    pub fn rank(&self, value: f64) -> Option<f64> {
        assert!(!value.is_nan(), "value must not be NaN");
        if self.is_empty() {
            return None;
        }
        let rank = tuple::rank(&self.tuples, self.key(value), self.count);
        Some(if self.config.is_high() { 1. - rank } else { rank })
    }

    /// Serializes this sketch to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes =
            SketchBytes::with_capacity(4 + 8 + 8 + 8 + 8 + 4 + self.tuples.len() * 24);
        let mut flags = 0;
        if self.is_empty() {
            flags |= FLAGS_IS_EMPTY;
        }
        if self.config.use_bands {
            flags |= FLAGS_USE_BANDS;
        }
        bytes.write_preamble(
            &Family::BIASED_GK,
            SERIAL_VERSION,
            flags,
            self.config.compression.to_byte(),
        );
        bytes.write_f64_le(self.config.eps);
        bytes.write_f64_le(self.config.target_prob);
        bytes.write_u64_le(self.count);
        bytes.write_u64_le(self.next_compress);
        if !self.is_empty() {
            tuple::write_tuples(&mut bytes, &self.tuples);
        }
        bytes.into_bytes()
    }

    /// Writes the serialized sketch to `writer`.
    pub fn save<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.serialize())
    }

    /// Deserializes a sketch from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidData`](crate::error::ErrorKind::InvalidData) if the bytes are
    /// truncated or malformed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::load(bytes)
    }

    /// Reads a sketch from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidData`](crate::error::ErrorKind::InvalidData) if the stream
    /// ends early or is malformed.
    pub fn load<R: Read>(reader: R) -> Result<Self, Error> {
        let mut reader = SketchReader::new(reader);
        let (flags, policy) = read_preamble(&mut reader, &Family::BIASED_GK, SERIAL_VERSION)?;
        let config = BiasedGkConfig {
            eps: reader.read_f64_le().map_err(make_error("eps"))?,
            target_prob: reader.read_f64_le().map_err(make_error("target_prob"))?,
            compression: Compression::from_byte(policy)?,
            use_bands: flags & FLAGS_USE_BANDS != 0,
        };
        config
            .validate()
            .map_err(|err| Error::malformed(err.message()))?;
        let count = reader.read_u64_le().map_err(make_error("count"))?;
        let next_compress = reader.read_u64_le().map_err(make_error("next_compress"))?;
        let is_empty = flags & FLAGS_IS_EMPTY != 0;
        if is_empty != (count == 0) {
            return Err(Error::malformed(format!("empty flag does not match count {count}")));
        }

        let mut sketch = BiasedGkSketch::make(config);
        if !is_empty {
            sketch.tuples = tuple::read_tuples(&mut reader, count)?;
        }
        sketch.count = count;
        sketch.next_compress = next_compress;
        Ok(sketch)
    }
}

/// Number of insertions before the first periodic compression.
fn first_compress(eps: f64) -> u64 {
    ((0.5 / eps).ceil() as u64).max(1)
}
