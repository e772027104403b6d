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

//! Greenwald-Khanna quantile summaries.
//!
//! A Greenwald-Khanna (GK) summary keeps a sorted list of tuples `(value, g, delta)`. `g` is the
//! number of inserted values between the previous tuple's value (exclusive) and this tuple's
//! value (inclusive), and `delta` bounds how uncertain the rank of `value` is. Keeping
//! `g + delta` of every tuple under a budget bounds the rank error of every answer, while
//! periodic compression merges neighbouring tuples to keep the summary small.
//!
//! * [`GkSketch`] has a uniform budget of `2 * eps * n`, so every rank is answered within
//!   `eps * n`.
//! * [`BiasedGkSketch`] scales the budget with the rank. It is precise around a target rank in
//!   one tail (for instance p1 or p99) and relatively precise everywhere else.
//!
//! Both variants optionally restrict merges by *bands*. A tuple with a large remaining capacity
//! (an old tuple) is never merged into a neighbour with a smaller one, which keeps old
//! tuples from swallowing recent ones.

mod biased;
mod serialization;
mod sketch;
pub(crate) mod tuple;

pub use self::biased::BiasedGkConfig;
pub use self::biased::BiasedGkSketch;
pub use self::sketch::DEFAULT_EPS;
pub use self::sketch::GkConfig;
pub use self::sketch::GkSketch;
