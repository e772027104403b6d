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

/// The default rank error of a [`GkSketch`].
pub const DEFAULT_EPS: f64 = 0.01;

/// Configuration of a [`GkSketch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GkConfig {
    /// Maximum rank error, relative to the number of inserted values.
    ///
    /// Must be in `(0, 0.5)`. Defaults to [`DEFAULT_EPS`].
    pub eps: f64,
    /// When to compress. [`Compression::Periodic`] (the default) compresses every
    /// `ceil(1 / (2 * eps))` insertions, [`Compression::Never`] only on
    /// [`GkSketch::compress`].
    pub compression: Compression,
    /// Only merge a tuple into a neighbour of the same or a higher band. Defaults to true.
    pub use_bands: bool,
}

impl Default for GkConfig {
    fn default() -> Self {
        GkConfig {
            eps: DEFAULT_EPS,
            compression: Compression::Periodic,
            use_bands: true,
        }
    }
}

impl GkConfig {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        check_eps(self.eps, "eps")
    }
}

/// Greenwald-Khanna quantile summary with a uniform rank error.
///
/// For any rank `r`, [`quantile`](Self::quantile) returns a value whose true rank among the `n`
/// inserted values is within `eps * n` of `r * n`. Unlike t-digest, the returned values are
/// always values that were inserted.
///
/// # Examples
///
/// ```
/// # use quantiles::gk::{GkConfig, GkSketch};
/// let mut sketch = GkSketch::new(GkConfig {
///     eps: 0.01,
///     ..Default::default()
/// });
/// for i in 0..1000 {
///     sketch.insert(i as f64);
/// }
/// let median = sketch.quantile(0.5).unwrap();
/// assert!((490.0..=510.0).contains(&median));
/// ```
#[derive(Debug, Clone)]
pub struct GkSketch {
    config: GkConfig,
    tuples: Vec<Tuple>,
    count: u64,
    next_compress: u64,
}

impl Default for GkSketch {
    fn default() -> Self {
        GkSketch::make(GkConfig::default())
    }
}

impl GkSketch {
    /// Creates an empty sketch.
    ///
    /// # Panics
    ///
    /// Panics if `eps` is not in `(0, 0.5)`.
    pub fn new(config: GkConfig) -> Self {
        match Self::try_new(config) {
            Ok(sketch) => sketch,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates an empty sketch.
    ///
    /// # Errors
    ///
    /// If `eps` is not in `(0, 0.5)`, returns
    /// [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument).
    pub fn try_new(config: GkConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::make(config))
    }

    fn make(config: GkConfig) -> Self {
        GkSketch {
            config,
            tuples: Vec::new(),
            count: 0,
            next_compress: compress_interval(config.eps),
        }
    }

    /// Inserts a value.
    ///
    /// [f64::NAN], [f64::INFINITY], and [f64::NEG_INFINITY] values are ignored.
    pub fn insert(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        self.count += 1;
        let pos = self.tuples.partition_point(|t| t.value <= value);
        if pos == 0 || pos == self.tuples.len() {
            self.tuples.insert(pos, Tuple::exact(value));
        } else {
            let max_uncert = self.max_uncert();
            let right = &mut self.tuples[pos];
            if 1 + right.g + right.delta <= max_uncert {
                right.g += 1;
            } else {
                let delta = right.g + right.delta - 1;
                self.tuples.insert(pos, Tuple { value, g: 1, delta });
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
    ///
    /// The first and the last tuple are never removed, so the minimum and the maximum stay
    /// exact.
    pub fn compress(&mut self) {
        self.next_compress = self.count + compress_interval(self.config.eps);

        let len = self.tuples.len();
        if len < 4 {
            return;
        }

        let max_uncert = self.max_uncert();
        let use_bands = self.config.use_bands;
        // built from the right, merging each tuple into its right neighbour
        let mut merged = Vec::with_capacity(len);
        merged.push(self.tuples[len - 1]);
        merged.push(self.tuples[len - 2]);
        for &tuple in self.tuples[1..len - 2].iter().rev() {
            let Some(next) = merged.last_mut() else {
                unreachable!("merged holds at least two tuples");
            };
            let mergeable = tuple.g + next.g + next.delta <= max_uncert;
            let same_band = !use_bands
                || tuple::band(tuple.delta, max_uncert) <= tuple::band(next.delta, max_uncert);
            if mergeable && same_band {
                next.g += tuple.g;
            } else {
                merged.push(tuple);
            }
        }
        merged.push(self.tuples[0]);
        merged.reverse();

        tracing::trace!(before = len, after = merged.len(), count = self.count, "compressed GK");
        self.tuples = merged;
    }

    /// Maximum `g + delta` of any tuple.
    fn max_uncert(&self) -> u64 {
        (2. * self.config.eps * self.count as f64) as u64
    }

    /// Returns the configuration this sketch was created with.
    pub fn params(&self) -> GkConfig {
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
        self.tuples.first().map(|t| t.value)
    }

    /// Returns the maximum inserted value.
    pub fn max_value(&self) -> Option<f64> {
        self.tuples.last().map(|t| t.value)
    }

    /// Returns an inserted value whose rank is within `eps` of the given normalized rank, or
    /// `None` if the sketch is empty.
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
        Some(tuple::query(&self.tuples, rank * n, self.config.eps * n))
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
        Some(tuple::rank(&self.tuples, value, self.count))
    }

    pub(crate) fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    /// Serializes this sketch to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(4 + 8 + 8 + 8 + 4 + self.tuples.len() * 24);
        let mut flags = 0;
        if self.is_empty() {
            flags |= FLAGS_IS_EMPTY;
        }
        if self.config.use_bands {
            flags |= FLAGS_USE_BANDS;
        }
        bytes.write_preamble(
            &Family::GK,
            SERIAL_VERSION,
            flags,
            self.config.compression.to_byte(),
        );
        bytes.write_f64_le(self.config.eps);
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
        let (flags, policy) = read_preamble(&mut reader, &Family::GK, SERIAL_VERSION)?;
        let config = GkConfig {
            eps: reader.read_f64_le().map_err(make_error("eps"))?,
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
        let tuples = if is_empty {
            Vec::new()
        } else {
            tuple::read_tuples(&mut reader, count)?
        };

        Ok(GkSketch {
            config,
            tuples,
            count,
            next_compress,
        })
    }
}

/// Number of insertions between periodic compressions.
fn compress_interval(eps: f64) -> u64 {
    ((1. / (2. * eps)).ceil() as u64).max(1)
}
