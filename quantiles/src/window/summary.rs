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

use std::collections::VecDeque;
use std::io::Read;

use crate::codec::SketchBytes;
use crate::codec::SketchReader;
use crate::codec::make_error;
use crate::codec::read_len;
use crate::common::Compression;
use crate::common::check_eps;
use crate::error::Error;
use crate::gk::GkConfig;
use crate::gk::GkSketch;
use crate::gk::tuple::Tuple;

/// A run of consecutive insertions summarized by one GK sketch.
#[derive(Debug, Clone)]
struct Block {
    /// Position of the first value.
    first: u64,
    /// Position of the last value.
    last: u64,
    sketch: GkSketch,
}

/// A merged tuple: `value` has a rank in `[min_rank, max_rank]` among all live values.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ranked {
    value: f64,
    min_rank: u64,
    max_rank: u64,
}

/// Quantiles over the values inserted at positions `(latest - window, latest]`.
///
/// Positions are insertion sequence numbers for count windows and timestamps for time windows.
/// Values are grouped into blocks, which are dropped as a whole once their last position leaves
/// the window. Only the oldest block may hold values outside the window, and blocks are kept
/// small enough for those to be at most `count_eps` of the window.
#[derive(Debug, Clone)]
pub(super) struct WindowedGk {
    window: u64,
    quantile_eps: f64,
    count_eps: f64,
    blocks: VecDeque<Block>,
    count: u64,
    latest: Option<u64>,
    merged: Option<Vec<Ranked>>,
}

impl WindowedGk {
    pub(super) fn try_new(window: u64, quantile_eps: f64, count_eps: f64) -> Result<Self, Error> {
        if window == 0 {
            return Err(Error::invalid_config("window", "must be at least 1, got 0"));
        }
        check_eps(quantile_eps, "quantile_eps")?;
        check_eps(count_eps, "count_eps")?;
        Ok(WindowedGk {
            window,
            quantile_eps,
            count_eps,
            blocks: VecDeque::new(),
            count: 0,
            latest: None,
            merged: None,
        })
    }

    pub(super) fn window(&self) -> u64 {
        self.window
    }

    pub(super) fn quantile_eps(&self) -> f64 {
        self.quantile_eps
    }

    pub(super) fn count_eps(&self) -> f64 {
        self.count_eps
    }

    pub(super) fn latest(&self) -> Option<u64> {
        self.latest
    }

    pub(super) fn count(&self) -> u64 {
        self.count
    }

    pub(super) fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Inserts `value` at `position`, which must not be older than the latest position.
    pub(super) fn insert(&mut self, position: u64, value: f64) {
        debug_assert!(self.latest.is_none_or(|latest| position >= latest));

        let span_cap = cap(self.count_eps, self.window);
        let count_cap = cap(self.count_eps, self.count);
        let needs_block = match self.blocks.back() {
            None => true,
            Some(block) => {
                position.saturating_sub(block.first) >= span_cap
                    || block.sketch.total_count() >= count_cap
            }
        };
        if needs_block {
            if let Some(block) = self.blocks.back_mut() {
                block.sketch.compress();
                tracing::debug!(
                    first = block.first,
                    last = block.last,
                    values = block.sketch.total_count(),
                    tuples = block.sketch.num_tuples(),
                    "sealed window block"
                );
            }
            self.blocks.push_back(Block {
                first: position,
                last: position,
                sketch: GkSketch::new(block_config(self.quantile_eps)),
            });
        }

        // the back block exists: it was either found or pushed above
        if let Some(block) = self.blocks.back_mut() {
            block.last = position;
            block.sketch.insert(value);
            self.count += 1;
        }
        self.advance(position);
    }

    /// Moves the latest position forward and drops blocks that left the window.
    pub(super) fn advance(&mut self, position: u64) {
        let latest = self.latest.map_or(position, |latest| latest.max(position));
        self.latest = Some(latest);
        self.merged = None;

        while let Some(block) = self.blocks.front() {
            if block.last.saturating_add(self.window) > latest {
                break;
            }
            tracing::debug!(
                first = block.first,
                last = block.last,
                values = block.sketch.total_count(),
                latest,
                "evicted window block"
            );
            self.count -= block.sketch.total_count();
            self.blocks.pop_front();
        }
    }

    pub(super) fn quantile(&mut self, rank: f64) -> Option<f64> {
        if self.count == 0 {
            return None;
        }

        let n = self.count as f64;
        let target = rank * n;
        let eps_rank = self.quantile_eps * n;
        let merged = self.merged();
        if target <= 1. {
            return merged.first().map(|r| r.value);
        }
        for (i, ranked) in merged.iter().enumerate() {
            if ranked.max_rank as f64 > target + eps_rank {
                return Some(merged[i.saturating_sub(1)].value);
            }
        }
        merged.last().map(|r| r.value)
    }

    fn merged(&mut self) -> &[Ranked] {
        let blocks = &self.blocks;
        self.merged.get_or_insert_with(|| {
            let summaries: Vec<&[Tuple]> = blocks.iter().map(|b| b.sketch.tuples()).collect();
            merge_summaries(&summaries)
        })
    }

    pub(super) fn write(&self, bytes: &mut SketchBytes) {
        bytes.write_u64_le(self.window);
        bytes.write_f64_le(self.quantile_eps);
        bytes.write_f64_le(self.count_eps);
        bytes.write_bool(self.latest.is_some());
        bytes.write_u64_le(self.latest.unwrap_or_default());
        bytes.write_u32_le(self.blocks.len() as u32);
        for block in &self.blocks {
            bytes.write_u64_le(block.first);
            bytes.write_u64_le(block.last);
            bytes.write(&block.sketch.serialize());
        }
    }

    pub(super) fn read<R: Read>(reader: &mut SketchReader<R>) -> Result<Self, Error> {
        let window = reader.read_u64_le().map_err(make_error("window"))?;
        let quantile_eps = reader.read_f64_le().map_err(make_error("quantile_eps"))?;
        let count_eps = reader.read_f64_le().map_err(make_error("count_eps"))?;
        let mut summary = WindowedGk::try_new(window, quantile_eps, count_eps)
            .map_err(|err| Error::malformed(err.message()))?;
        let has_latest = reader.read_bool().map_err(make_error("has_latest"))?;
        let latest = reader.read_u64_le().map_err(make_error("latest"))?;
        let num_blocks = read_len(reader, "num_blocks", u32::MAX as usize)?;
        if num_blocks > 0 && !has_latest {
            return Err(Error::malformed("blocks without a latest position"));
        }

        let expected = block_config(quantile_eps);
        let mut prev_last = None;
        for index in 0..num_blocks {
            let first = reader.read_u64_le().map_err(make_error("block_first"))?;
            let last = reader.read_u64_le().map_err(make_error("block_last"))?;
            let sketch =
                GkSketch::load(reader.get_mut()).map_err(|err| err.with_context("block", index))?;
            if first > last || last > latest || prev_last.is_some_and(|prev| prev > first) {
                return Err(Error::malformed(format!("block [{first}, {last}] out of order")));
            }
            if sketch.is_empty() || sketch.params() != expected {
                return Err(Error::malformed("invalid block summary"));
            }
            prev_last = Some(last);
            summary.count += sketch.total_count();
            summary.blocks.push_back(Block {
                first,
                last,
                sketch,
            });
        }
        summary.latest = has_latest.then_some(latest);
        Ok(summary)
    }
}

/// `max(1, floor(eps * n))`
fn cap(eps: f64, n: u64) -> u64 {
    ((eps * n as f64) as u64).max(1)
}

fn block_config(quantile_eps: f64) -> GkConfig {
    GkConfig {
        eps: quantile_eps,
        compression: Compression::Periodic,
        use_bands: true,
    }
}

/// Combines GK summaries of disjoint parts of a stream into one ranked summary.
///
/// Walking all tuples in value order, the values known to be at or below the current tuple are
/// the `g`s seen so far. On top of those, each other summary may hide up to
/// `g + delta - 1` more values below its next unseen tuple.
fn merge_summaries(summaries: &[&[Tuple]]) -> Vec<Ranked> {
    let mut order: Vec<(usize, usize)> = summaries
        .iter()
        .enumerate()
        .flat_map(|(s, tuples)| (0..tuples.len()).map(move |i| (s, i)))
        .collect();
    order.sort_by(|&(s1, i1), &(s2, i2)| {
        summaries[s1][i1]
            .value
            .total_cmp(&summaries[s2][i2].value)
            .then((s1, i1).cmp(&(s2, i2)))
    });

    let hidden = |tuple: Option<&Tuple>| tuple.map_or(0, |t| t.g + t.delta - 1);
    let mut pending: Vec<u64> = summaries.iter().map(|s| hidden(s.first())).collect();
    let mut pending_sum: u64 = pending.iter().sum();
    let mut seen = 0u64;

    let mut merged = Vec::with_capacity(order.len());
    for (s, i) in order {
        let tuple = summaries[s][i];
        seen += tuple.g;
        pending_sum -= pending[s];
        merged.push(Ranked {
            value: tuple.value,
            min_rank: seen,
            max_rank: seen + tuple.delta + pending_sum,
        });
        pending[s] = hidden(summaries[s].get(i + 1));
        pending_sum += pending[s];
    }
    merged
}
