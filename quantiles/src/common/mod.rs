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

//! Definitions shared by all quantile sketches.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// When a sketch runs its compression (or recluster) pass.
///
/// The string forms `"never"`, `"periodic"` and `"aggressive"` are accepted by [`FromStr`].
///
/// # Examples
///
/// ```
/// # use quantiles::common::Compression;
/// let policy: Compression = "periodic".parse().unwrap();
/// assert_eq!(policy, Compression::Periodic);
/// assert_eq!(policy.to_string(), "periodic");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Only compress on explicit request, or when required to keep memory bounded.
    Never,
    /// Compress whenever the number of inserted values reaches a threshold that grows with the
    /// summary.
    Periodic,
    /// Compress after every insertion.
    Aggressive,
}

impl Compression {
    /// Returns true if a compression pass is due after `samples` insertions, given the
    /// periodic threshold `next_at`.
    pub fn should_compress(self, samples: u64, next_at: u64) -> bool {
        match self {
            Compression::Never => false,
            Compression::Periodic => samples >= next_at,
            Compression::Aggressive => true,
        }
    }

    /// Returns the policy name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Compression::Never => "never",
            Compression::Periodic => "periodic",
            Compression::Aggressive => "aggressive",
        }
    }

    pub(crate) const fn to_byte(self) -> u8 {
        match self {
            Compression::Never => 0,
            Compression::Periodic => 1,
            Compression::Aggressive => 2,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Result<Self, Error> {
        match byte {
            0 => Ok(Compression::Never),
            1 => Ok(Compression::Periodic),
            2 => Ok(Compression::Aggressive),
            _ => Err(Error::malformed(format!("unknown compression policy {byte}"))),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Compression::Never),
            "periodic" => Ok(Compression::Periodic),
            "aggressive" => Ok(Compression::Aggressive),
            _ => Err(Error::invalid_argument(format!(
                "unknown compression policy: {s:?}"
            ))),
        }
    }
}

/// Panics unless `rank` is a normalized rank.
#[track_caller]
pub(crate) fn check_rank(rank: f64) {
    assert!((0.0..=1.0).contains(&rank), "rank must be in [0.0, 1.0]");
}

/// Validates an epsilon parameter that must lie strictly inside `(0, 0.5)`.
pub(crate) fn check_eps(eps: f64, field: &'static str) -> Result<(), Error> {
    if eps > 0.0 && eps < 0.5 {
        Ok(())
    } else {
        Err(Error::invalid_config(
            field,
            format!("must be in (0, 0.5), got {eps}"),
        ))
    }
}
