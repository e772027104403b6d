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

use std::io::Read;

use crate::codec::SketchBytes;
use crate::codec::SketchReader;
use crate::codec::check_finite;
use crate::codec::check_nonzero;
use crate::codec::make_error;
use crate::codec::read_len;
use crate::error::Error;

/// A summary entry: `g` values ending at `value`, whose rank is uncertain by `delta`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Tuple {
    pub(crate) value: f64,
    pub(crate) g: u64,
    pub(crate) delta: u64,
}

impl Tuple {
    pub(crate) fn exact(value: f64) -> Self {
        Tuple {
            value,
            g: 1,
            delta: 0,
        }
    }
}

/// Returns the compression band of a tuple with uncertainty `delta` when tuples may span at
/// most `max_uncert` ranks.
///
/// Exact tuples are in the highest band. Otherwise the band `a` is the one where
/// `2^(a-1) + max_uncert mod 2^(a-1) <= max_uncert - delta < 2^a + max_uncert mod 2^a`.
pub(crate) fn band(delta: u64, max_uncert: u64) -> u32 {
    if delta == 0 {
        return u32::MAX;
    }
    if delta >= max_uncert {
        return 0;
    }

    let capacity = u128::from(max_uncert - delta);
    let p = u128::from(max_uncert);
    // the intervals are contiguous and start at 1, so the loop always returns
    for a in 1..=64u32 {
        let lower = (1u128 << (a - 1)) + p % (1u128 << (a - 1));
        let upper = (1u128 << a) + p % (1u128 << a);
        if lower <= capacity && capacity < upper {
            return a;
        }
    }
    capacity.ilog2() + 1
}

/// Walks the summary and returns the value whose rank is within `eps_rank` of `target`.
///
/// `tuples` must not be empty.
pub(crate) fn query(tuples: &[Tuple], target: f64, eps_rank: f64) -> f64 {
    debug_assert!(!tuples.is_empty());

    if target <= 1. {
        return tuples[0].value;
    }

    let mut min_rank = 0u64;
    for (i, tuple) in tuples.iter().enumerate() {
        min_rank += tuple.g;
        let max_rank = (min_rank + tuple.delta) as f64;
        if max_rank > target + eps_rank {
            return tuples[i.saturating_sub(1)].value;
        }
    }
    tuples[tuples.len() - 1].value
}

/// Returns the estimated normalized rank of `value` within `count` summarized values.
pub(crate) fn rank(tuples: &[Tuple], value: f64, count: u64) -> f64 {
    let mut min_rank = 0u64;
    for tuple in tuples {
        if tuple.value > value {
            // everything before this tuple is below value, the tuple itself may overlap it
            let max_below = min_rank + tuple.g + tuple.delta - 1;
            return (min_rank + max_below) as f64 / 2. / count as f64;
        }
        min_rank += tuple.g;
    }
    1.
}

pub(crate) fn write_tuples(bytes: &mut SketchBytes, tuples: &[Tuple]) {
    bytes.write_u32_le(tuples.len() as u32);
    for tuple in tuples {
        bytes.write_f64_le(tuple.value);
        bytes.write_u64_le(tuple.g);
        bytes.write_u64_le(tuple.delta);
    }
}

/// Reads a summary and checks that it is sorted and covers exactly `count` values.
pub(crate) fn read_tuples<R: Read>(
    reader: &mut SketchReader<R>,
    count: u64,
) -> Result<Vec<Tuple>, Error> {
    // every tuple covers at least one value
    let max_len = usize::try_from(count).unwrap_or(usize::MAX);
    let len = read_len(reader, "num_tuples", max_len)?;
    if (len == 0) != (count == 0) {
        return Err(Error::malformed(format!("{len} tuples for {count} values")));
    }

    let mut tuples: Vec<Tuple> = Vec::with_capacity(len.min(4096));
    let mut g_sum = 0u64;
    for _ in 0..len {
        let value = reader.read_f64_le().map_err(make_error("value"))?;
        let g = reader.read_u64_le().map_err(make_error("g"))?;
        let delta = reader.read_u64_le().map_err(make_error("delta"))?;
        check_finite(value, "tuple value")?;
        let g = check_nonzero(g, "tuple g")?.get();
        if tuples.last().is_some_and(|last| last.value > value) {
            return Err(Error::malformed("tuples are not sorted"));
        }
        g_sum = g_sum.saturating_add(g);
        tuples.push(Tuple { value, g, delta });
    }
    if g_sum != count {
        return Err(Error::malformed(format!("tuples cover {g_sum} values, expected {count}")));
    }
    if tuples.first().is_some_and(|first| first.delta != 0) {
        return Err(Error::malformed("first tuple is not exact"));
    }
    Ok(tuples)
}
