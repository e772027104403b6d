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
use crate::codec::check_finite;
use crate::codec::family::Family;
use crate::codec::make_error;
use crate::codec::read_len;
use crate::codec::read_preamble;
use crate::error::Error;
use crate::tdigest::Digest;
use crate::tdigest::DigestConfig;
use crate::tdigest::serialization::*;

/// The default number of values buffered before a flush.
pub const DEFAULT_BUFFER_LEN: usize = 1000;

/// Configuration of a [`BufferedDigest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedDigestConfig {
    /// Configuration of the underlying digest.
    pub digest: DigestConfig,
    /// Number of values collected before they are flushed into the digest.
    ///
    /// Must be at least 1. Defaults to [`DEFAULT_BUFFER_LEN`].
    pub buffer_len: usize,
}

impl Default for BufferedDigestConfig {
    fn default() -> Self {
        BufferedDigestConfig {
            digest: DigestConfig::default(),
            buffer_len: DEFAULT_BUFFER_LEN,
        }
    }
}

impl BufferedDigestConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.buffer_len == 0 {
            return Err(Error::invalid_config("buffer_len", "must be at least 1, got 0"));
        }
        self.digest.validate()
    }
}

/// A [`Digest`] that collects values in a buffer and inserts them in batches.
///
/// Queries only see values that have been flushed. The buffer is flushed automatically by the
/// insert that fills it, or explicitly with [`flush`](Self::flush).
///
/// # Examples
///
/// ```
/// # use quantiles::tdigest::{BufferedDigest, BufferedDigestConfig};
/// let mut digest = BufferedDigest::new(BufferedDigestConfig {
///     buffer_len: 3,
///     ..Default::default()
/// });
/// digest.insert(1.0);
/// digest.insert(2.0);
/// assert_eq!(digest.quantile(0.5), None);
/// digest.insert(3.0);
/// assert_eq!(digest.quantile(0.5), Some(2.0));
/// ```
#[derive(Debug, Clone)]
pub struct BufferedDigest {
    buffer_len: usize,
    buffer: Vec<f64>,
    digest: Digest,
}

impl Default for BufferedDigest {
    fn default() -> Self {
        BufferedDigest::new(BufferedDigestConfig::default())
    }
}

impl BufferedDigest {
    /// Creates an empty buffered digest.
    ///
    /// The fallible version of this method is [`BufferedDigest::try_new`].
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: BufferedDigestConfig) -> Self {
        match Self::try_new(config) {
            Ok(digest) => digest,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates an empty buffered digest.
    ///
    /// # Errors
    ///
    /// If `buffer_len` is zero or the digest configuration is invalid, returns
    /// [`ErrorKind::InvalidArgument`](crate::error::ErrorKind::InvalidArgument).
    pub fn try_new(config: BufferedDigestConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(BufferedDigest {
            buffer_len: config.buffer_len,
            buffer: Vec::with_capacity(config.buffer_len.min(DEFAULT_BUFFER_LEN)),
            digest: Digest::try_new(config.digest)?,
        })
    }

    /// Buffers a value, flushing the buffer once it holds `buffer_len` values.
    ///
    /// [f64::NAN], [f64::INFINITY], and [f64::NEG_INFINITY] values are ignored.
    pub fn insert(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        self.buffer.push(value);
        if self.buffer.len() >= self.buffer_len {
            self.flush();
        }
    }

    /// Inserts all buffered values into the digest.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        tracing::debug!(values = self.buffer.len(), "flushing buffered digest");
        for value in self.buffer.drain(..) {
            self.digest.insert(value);
        }
    }

    /// Returns the configuration this digest was created with.
    pub fn params(&self) -> BufferedDigestConfig {
        BufferedDigestConfig {
            digest: self.digest.params(),
            buffer_len: self.buffer_len,
        }
    }

    /// Returns the number of values waiting for the next flush.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the underlying digest, which holds all flushed values.
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Returns true if no value has been flushed yet.
    pub fn is_empty(&self) -> bool {
        self.digest.is_empty()
    }

    /// Returns the number of flushed values.
    pub fn total_weight(&self) -> u64 {
        self.digest.total_weight()
    }

    /// Returns the minimum flushed value.
    pub fn min_value(&self) -> Option<f64> {
        self.digest.min_value()
    }

    /// Returns the maximum flushed value.
    pub fn max_value(&self) -> Option<f64> {
        self.digest.max_value()
    }

    /// See [`Digest::quantile`]. Returns `None` until the first flush.
    pub fn quantile(&self, rank: f64) -> Option<f64> {
        self.digest.quantile(rank)
    }

    /// See [`Digest::quantiles`].
    pub fn quantiles(&self, ranks: &[f64]) -> Option<Vec<f64>> {
        self.digest.quantiles(ranks)
    }

    /// See [`Digest::rank`].
    pub fn rank(&self, value: f64) -> Option<f64> {
        self.digest.rank(value)
    }

    /// Serializes the buffer and the digest to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let digest = self.digest.serialize();
        let capacity = 4 + 8 + 4 + self.buffer.len() * 8 + digest.len();
        let mut bytes = SketchBytes::with_capacity(capacity);
        bytes.write_preamble(
            &Family::BUFFERED_DIGEST,
            SERIAL_VERSION,
            if self.buffer.is_empty() {
                0
            } else {
                FLAGS_HAS_BUFFERED
            },
            0,
        );
        bytes.write_u64_le(self.buffer_len as u64);
        if !self.buffer.is_empty() {
            bytes.write_u32_le(self.buffer.len() as u32);
            for &value in &self.buffer {
                bytes.write_f64_le(value);
            }
        }
        bytes.write(&digest);
        bytes.into_bytes()
    }

    /// Writes the serialized sketch to `writer`.
    pub fn save<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.serialize())
    }

    /// Deserializes a buffered digest from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidData`](crate::error::ErrorKind::InvalidData) if the bytes are
    /// truncated or malformed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::load(bytes)
    }

    /// Reads a buffered digest from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidData`](crate::error::ErrorKind::InvalidData) if the stream
    /// ends early or is malformed.
    pub fn load<R: Read>(reader: R) -> Result<Self, Error> {
        let mut reader = SketchReader::new(reader);
        let (flags, _) = read_preamble(&mut reader, &Family::BUFFERED_DIGEST, SERIAL_VERSION)?;
        let buffer_len = reader.read_u64_le().map_err(make_error("buffer_len"))?;
        let buffer_len = usize::try_from(buffer_len)
            .ok()
            .filter(|&len| len > 0)
            .ok_or_else(|| {
                Error::malformed(format!("invalid buffer_len {buffer_len}"))
            })?;

        let mut buffer = Vec::new();
        if flags & FLAGS_HAS_BUFFERED != 0 {
            // a full buffer is always flushed
            let len = read_len(&mut reader, "num_buffered", buffer_len - 1)?;
            buffer.reserve(len.min(DEFAULT_BUFFER_LEN));
            for _ in 0..len {
                let value = reader.read_f64_le().map_err(make_error("buffered_value"))?;
                check_finite(value, "buffered_value")?;
                buffer.push(value);
            }
        }
        let digest = Digest::load(reader.get_mut())?;

        Ok(BufferedDigest {
            buffer_len,
            buffer,
            digest,
        })
    }
}
