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

//! Quantiles over sliding windows.
//!
//! [`CountWindowGk`] keeps the last `window_size` values, [`TimeWindowGk`] the values of the
//! last `window` time units. Both split the stream into consecutive blocks, each summarized by a
//! [`GkSketch`](crate::gk::GkSketch), and drop a block once all of its values have left the
//! window. Queries merge the rank bounds of all live blocks.
//!
//! Blocks span at most `count_eps` of the window, so the oldest block holds at most that many
//! values that already left the window. Together with the summaries' own error this bounds the
//! rank error by `(quantile_eps + 2 * count_eps)` times the window content.

mod count;
mod serialization;
mod summary;
mod time;

pub use self::count::CountWindowConfig;
pub use self::count::CountWindowGk;
pub use self::time::TimeWindowConfig;
pub use self::time::TimeWindowGk;
