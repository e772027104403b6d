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
use crate::codec::read_preamble;
use crate::common::check_rank;
use crate::error::Error;
use crate::window::serialization::*;
use crate::window::summary::WindowedGk;

/// Configuration of a [`CountWindowGk`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountWindowConfig {
    /// Number of most recent values the quantiles are computed over. Must be at least 1.
    /// Defaults to 1000.
    pub window_size: u64,
    /// Rank error of the summaries. Must be in `(0, 0.5)`. Defaults to 0.01.
    pub quantile_eps: f64,
    /// Fraction of the window that may be evicted late. Must be in `(0, 0.5)`. Defaults to
    /// 0.001.
    pub count_eps: f64,
}

impl Default for CountWindowConfig {
    fn default() -> Self {
        CountWindowConfig {
            window_size: 1000,
            quantile_eps: 0.01,
            count_eps: 0.001,
        }
    }
}

/// Quantiles over the last `window_size` inserted values.
///
/// Answers have a rank error of at most `(quantile_eps + 2 * count_eps) * window_size`
/// relative to the values in the window.
///
/// # Examples
///
/// ```
/// # use quantiles::window::{CountWindowConfig, CountWindowGk};
/// let mut sketch = CountWindowGk::new(CountWindowConfig {
///     window_size: 100,
///     ..Default::default()
/// });
/// for i in 0..1000 {
///     sketch.insert(i as f64);
/// }
/// // only 900..1000 are in the window
/// assert_eq!(sketch.quantile(0.0), Some(900.0));
/// ```
#[derive(Debug, Clone)]
pub struct CountWindowGk {
    summary: WindowedGk,
}

impl Default for CountWindowGk {
    fn default() -> Self {
        CountWindowGk::new(CountWindowConfig::default())
    }
}

impl CountWindowGk {
    /// Creates an empty sketch.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: CountWindowConfig) -> Self {
        match Self::try_new(config) {
            Ok(sketch) => sketch,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates an empty sketch.
    ///
    /// # Errors
    ///
    /// If `window_size` is zero or either epsilon is not in `(0, 0.5)`, returns
    /// [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument).
    pub fn try_new(config: CountWindowConfig) -> Result<Self, Error> {
        if config.window_size == 0 {
            return Err(Error::invalid_config("window_size", "must be at least 1, got 0"));
        }
        WindowedGk::try_new(config.window_size, config.quantile_eps, config.count_eps)
            .map(|summary| CountWindowGk { summary })
    }

    /// Inserts a value, evicting the values that fall out of the window.
    ///
    /// [f64::NAN], [f64::INFINITY], and [f64::NEG_INFINITY] values are ignored and do not
    /// advance the window.
    pub fn insert(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let position = self.summary.latest().map_or(0, |latest| latest + 1);
        self.summary.insert(position, value);
    }

    /// Returns the configuration this sketch was created with.
    pub fn params(&self) -> CountWindowConfig {
        CountWindowConfig {
            window_size: self.summary.window(),
            quantile_eps: self.summary.quantile_eps(),
            count_eps: self.summary.count_eps(),
        }
    }

    /// Returns true if there are no values in the window.
    pub fn is_empty(&self) -> bool {
        self.summary.count() == 0
    }

    /// Returns the number of values currently summarized. This may exceed the window size by
    /// the values that are due to be evicted with the oldest block.
    pub fn total_count(&self) -> u64 {
        self.summary.count()
    }

    /// Returns the number of blocks the window is split into.
    pub fn num_blocks(&self) -> usize {
        self.summary.num_blocks()
    }

    /// Returns a value from the window close to the given normalized rank, or `None` if the
    /// window is empty.
    ///
    /// # Panics
    ///
    /// Panics if `rank` is not in `[0.0, 1.0]`.
    pub fn quantile(&mut self, rank: f64) -> Option<f64> {
        check_rank(rank);
        self.summary.quantile(rank)
    }

    /// Returns [`quantile`](Self::quantile) for every given rank.
    ///
    /// # Panics
    ///
    /// Panics if any rank is not in `[0.0, 1.0]`.
    pub fn quantiles(&mut self, ranks: &[f64]) -> Option<Vec<f64>> {
        ranks.iter().map(|&rank| self.quantile(rank)).collect()
    }

    /// Serializes this sketch to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(64);
        bytes.write_preamble(
            &Family::COUNT_WINDOW_GK,
            SERIAL_VERSION,
            if self.is_empty() { FLAGS_IS_EMPTY } else { 0 },
            0,
        );
        self.summary.write(&mut bytes);
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
        let (flags, _) = read_preamble(&mut reader, &Family::COUNT_WINDOW_GK, SERIAL_VERSION)?;
        let summary = WindowedGk::read(&mut reader)?;
        if (flags & FLAGS_IS_EMPTY != 0) != (summary.count() == 0) {
            return Err(Error::malformed("empty flag does not match the window"));
        }
        Ok(CountWindowGk { summary })
    }
}
