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

use byteorder::LE;
use byteorder::ReadBytesExt;

use crate::codec::family::Family;
use crate::error::Error;

/// A wrapper around any byte source that provides methods for reading sketch fields from it.
///
/// The reader never consumes more bytes than the fields requested, so several sketches can be
/// read back to back from the same stream.
pub struct SketchReader<R> {
    inner: R,
}

impl<R: Read> SketchReader<R> {
    /// Creates a new `SketchReader` over the given byte source.
    pub fn new(inner: R) -> Self {
        SketchReader { inner }
    }

    /// Returns a mutable reference to the underlying byte source.
    ///
    /// Used to hand the stream over to a nested sketch.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.inner.read_u8()
    }

    /// Reads a single byte and interprets any non-zero value as `true`.
    pub fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.inner.read_u8()? != 0)
    }

    /// Reads a 32-bit unsigned integer in little-endian byte order.
    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        self.inner.read_u32::<LE>()
    }

    /// Reads a 64-bit unsigned integer in little-endian byte order.
    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        self.inner.read_u64::<LE>()
    }

    /// Reads a 128-bit unsigned integer in little-endian byte order.
    pub fn read_u128_le(&mut self) -> io::Result<u128> {
        self.inner.read_u128::<LE>()
    }

    /// Reads a 64-bit floating point number in little-endian byte order.
    pub fn read_f64_le(&mut self) -> io::Result<f64> {
        self.inner.read_f64::<LE>()
    }
}

/// Returns a closure mapping an I/O failure of the named field to a deserialization error.
pub(crate) fn make_error(tag: &'static str) -> impl FnOnce(io::Error) -> Error {
    move |_| Error::insufficient_data(tag)
}

/// Reads the four-byte preamble shared by all sketches and returns its `(flags, policy)` bytes.
///
/// Fails unless the family and serial version match the expected ones.
pub(crate) fn read_preamble<R: Read>(
    reader: &mut SketchReader<R>,
    family: &Family,
    serial_version: u8,
) -> Result<(u8, u8), Error> {
    let family_id = reader.read_u8().map_err(make_error("family_id"))?;
    family.validate_id(family_id)?;
    let version = reader.read_u8().map_err(make_error("serial_version"))?;
    if version != serial_version {
        return Err(Error::unsupported_serial_version(serial_version, version));
    }
    let flags = reader.read_u8().map_err(make_error("flags"))?;
    let policy = reader.read_u8().map_err(make_error("policy"))?;
    Ok((flags, policy))
}

fn check_non_nan(value: f64, tag: &'static str) -> Result<(), Error> {
    if value.is_nan() {
        return Err(Error::malformed(format!("{tag} cannot be NaN")));
    }

    Ok(())
}

pub(crate) fn check_finite(value: f64, tag: &'static str) -> Result<(), Error> {
    check_non_nan(value, tag)?;
    if value.is_infinite() {
        return Err(Error::malformed(format!("{tag} cannot be infinite")));
    }

    Ok(())
}

pub(crate) fn check_nonzero(value: u64, tag: &'static str) -> Result<NonZeroU64, Error> {
    NonZeroU64::new(value)
        .ok_or_else(|| Error::malformed(format!("{tag} cannot be zero")))
}

/// Reads a length prefix and checks it against an upper bound before anything is allocated.
pub(crate) fn read_len<R: Read>(
    reader: &mut SketchReader<R>,
    tag: &'static str,
    max: usize,
) -> Result<usize, Error> {
    let len = reader.read_u32_le().map_err(make_error(tag))? as usize;
    if len > max {
        return Err(Error::malformed(format!("{tag} {len} exceeds the limit {max}")));
    }
    Ok(len)
}
