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

/// Configuration of a [`TimeWindowGk`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindowConfig {
    /// Length of the window, in the unit of the timestamps passed to
    /// [`TimeWindowGk::insert`]. Must be at least 1. Defaults to 60000 (a minute of
    /// milliseconds).
    pub window: u64,
    /// Rank error of the summaries. Must be in `(0, 0.5)`. Defaults to 0.01.
    pub quantile_eps: f64,
    /// Fraction of the window that may be evicted late. Must be in `(0, 0.5)`. Defaults to
    /// 0.001.
    pub count_eps: f64,
}

impl Default for TimeWindowConfig {
    fn default() -> Self {
        TimeWindowConfig {
            window: 60_000,
            quantile_eps: 0.01,
            count_eps: 0.001,
        }
    }
}

/// Quantiles over the values whose timestamp lies within `window` of the latest timestamp.
///
/// A value inserted at time `t` is in the window while `t > latest - window`. Timestamps must
/// not go backwards; an older timestamp is treated as the latest one.
///
/// # Examples
///
/// ```
/// # use quantiles::window::{TimeWindowConfig, TimeWindowGk};
/// let mut sketch = TimeWindowGk::new(TimeWindowConfig {
///     window: 1000,
///     ..Default::default()
/// });
/// sketch.insert(0, 1.0);
/// sketch.insert(500, 2.0);
/// assert_eq!(sketch.quantile(0.0), Some(1.0));
/// sketch.update_time(1200);
/// assert_eq!(sketch.quantile(0.0), Some(2.0));
/// ```
#[derive(Debug, Clone)]
pub struct TimeWindowGk {
    summary: WindowedGk,
}

impl Default for TimeWindowGk {
    fn default() -> Self {
        TimeWindowGk::new(TimeWindowConfig::default())
    }
}

impl TimeWindowGk {
    /// Creates an empty sketch.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: TimeWindowConfig) -> Self {
        match Self::try_new(config) {
            Ok(sketch) => sketch,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates an empty sketch.
    ///
    /// # Errors
    ///
    /// If `window` is zero or either epsilon is not in `(0, 0.5)`, returns
    /// [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument).
    pub fn try_new(config: TimeWindowConfig) -> Result<Self, Error> {
        WindowedGk::try_new(config.window, config.quantile_eps, config.count_eps)
            .map(|summary| TimeWindowGk { summary })
    }

    /// Inserts a value observed at `timestamp` and evicts the values that fall out of the
    /// window.
    ///
    /// [f64::NAN], [f64::INFINITY], and [f64::NEG_INFINITY] values are ignored.
    pub fn insert(&mut self, timestamp: u64, value: f64) {
        if !value.is_finite() {
            return;
        }
        let timestamp = self.clamp(timestamp);
        self.summary.insert(timestamp, value);
    }

    /// Moves the clock to `timestamp` without inserting, evicting the values that fall out of
    /// the window.
    pub fn update_time(&mut self, timestamp: u64) {
        let timestamp = self.clamp(timestamp);
        self.summary.advance(timestamp);
    }

    fn clamp(&self, timestamp: u64) -> u64 {
        match self.summary.latest() {
            Some(latest) if timestamp < latest => {
                tracing::warn!(timestamp, latest, "timestamp went backwards, using latest");
                latest
            }
            _ => timestamp,
        }
    }

    /// Returns the configuration this sketch was created with.
    pub fn params(&self) -> TimeWindowConfig {
        TimeWindowConfig {
            window: self.summary.window(),
            quantile_eps: self.summary.quantile_eps(),
            count_eps: self.summary.count_eps(),
        }
    }

    /// Returns the latest timestamp seen, if any.
    pub fn latest_time(&self) -> Option<u64> {
        self.summary.latest()
    }

    /// Returns true if there are no values in the window.
    pub fn is_empty(&self) -> bool {
        self.summary.count() == 0
    }

    /// Returns the number of values currently summarized, including values of the oldest block
    /// that are due to be evicted.
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
            &Family::TIME_WINDOW_GK,
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
        let (flags, _) = read_preamble(&mut reader, &Family::TIME_WINDOW_GK, SERIAL_VERSION)?;
        let summary = WindowedGk::read(&mut reader)?;
        if (flags & FLAGS_IS_EMPTY != 0) != (summary.count() == 0) {
            return Err(Error::malformed("empty flag does not match the window"));
        }
        Ok(TimeWindowGk { summary })
    }
}
